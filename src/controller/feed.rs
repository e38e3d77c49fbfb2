//! Desired state read from a JSON file.
//!
//! Lets the controller run without an orchestrator: every effective change of
//! the file is one update cycle.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::config::FileChanged;
use crate::controller::edge::EdgeController;
use crate::controller::ReloadOutcome;
use crate::error::ControllerError;
use crate::model::ConfigModel;
use crate::process::ProcessControl;

pub struct ModelFeed {
    path: PathBuf,
}

impl ModelFeed {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<ConfigModel, ControllerError> {
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|source| ControllerError::ModelRead {
                path: self.path.display().to_string(),
                source,
            })?;
        serde_json::from_slice(&raw).map_err(|source| ControllerError::ModelParse {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Load the model and run one update cycle.
    pub async fn apply<P: ProcessControl>(
        &self,
        controller: &EdgeController<P>,
    ) -> Result<ReloadOutcome, ControllerError> {
        let model = self.load().await?;
        controller.sync(&model).await
    }

    /// Apply the model on every change event until shutdown.
    ///
    /// A bad model is logged and skipped; the running configuration stays.
    pub async fn run<P: ProcessControl>(
        self,
        controller: Arc<EdgeController<P>>,
        mut changes: mpsc::UnboundedReceiver<FileChanged>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                change = changes.recv() => {
                    if change.is_none() {
                        break;
                    }
                    match self.apply(&controller).await {
                        Ok(outcome) => tracing::info!(path = %self.path.display(), outcome = ?outcome, "Model applied"),
                        Err(e) => tracing::error!(path = %self.path.display(), error = %e, "Failed to apply model"),
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
        tracing::debug!("Model feed stopped");
    }
}
