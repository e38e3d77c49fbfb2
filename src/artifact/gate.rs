//! Change detection against the persisted artifact.
//!
//! Signalling the edge process is disruptive, so a reload only happens when
//! the candidate differs byte-for-byte from what is already on disk.
//!
//! Writes are atomic: the artifact is written to a temporary file in the same
//! directory, synced, then renamed over the target.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// The artifact could not be written.
#[derive(Debug, Error)]
#[error("failed to persist {path}: {source}")]
pub struct PersistError {
    pub path: String,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Clone)]
pub struct ChangeGate {
    path: PathBuf,
}

impl ChangeGate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True unless the persisted artifact equals `candidate`.
    pub async fn needs_reload(&self, candidate: &[u8]) -> bool {
        match tokio::fs::read(&self.path).await {
            Ok(current) => current != candidate,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = ?self.path, "No persisted artifact yet");
                true
            }
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "Unable to read persisted artifact");
                true
            }
        }
    }

    /// Atomically replace the persisted artifact.
    pub async fn persist(&self, data: &[u8]) -> Result<(), PersistError> {
        let tmp = self.temp_path();
        let result = write_then_rename(&tmp, &self.path, data).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        result.map_err(|source| PersistError {
            path: self.path.display().to_string(),
            source,
        })
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }
}

async fn write_then_rename(tmp: &Path, target: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o644);

    let mut file = options.open(tmp).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(tmp, target).await
}
