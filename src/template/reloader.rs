//! Template hot-swap owner.
//!
//! The only task that replaces the active template. Change events are
//! processed one at a time, so two recompilations never race each other.

use std::path::{Path, PathBuf};

use tokio::sync::{broadcast, mpsc};

use crate::config::FileChanged;
use crate::observability::metrics;
use crate::template::compiled::CompiledTemplate;
use crate::template::error::CompileError;
use crate::template::renderer::TemplateSlot;

pub struct TemplateReloader {
    slot: TemplateSlot,
    path: PathBuf,
}

impl TemplateReloader {
    pub fn new(slot: TemplateSlot, path: &Path) -> Self {
        Self {
            slot,
            path: path.to_path_buf(),
        }
    }

    /// Recompile the template and swap it in.
    ///
    /// On error the previously active template is left in place.
    pub fn reload(&self) -> Result<(), CompileError> {
        let compiled = CompiledTemplate::compile(&self.path);
        metrics::record_template_reload(compiled.is_ok());
        self.slot.store(compiled?);
        Ok(())
    }

    /// Process change events until shutdown or until the event source closes.
    pub async fn run(
        self,
        mut changes: mpsc::UnboundedReceiver<FileChanged>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                change = changes.recv() => {
                    let Some(change) = change else { break };
                    match self.reload() {
                        Ok(()) => tracing::info!(path = ?change.path, "New template loaded"),
                        Err(e) => tracing::error!(
                            path = ?change.path,
                            error = %e,
                            "Error loading new template, keeping previous template"
                        ),
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
        tracing::debug!("Template reloader stopped");
    }
}
