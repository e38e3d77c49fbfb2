//! Aggregate error of the controller.

use std::sync::Arc;

use thiserror::Error;

use crate::artifact::PersistError;
use crate::config::SettingsError;
use crate::process::{SignalError, SpawnError};
use crate::template::{CompileError, RenderError};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error("failed to read model {path}: {source}")]
    ModelRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid model {path}: {source}")]
    ModelParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize model: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("file watch failed: {0}")]
    Watch(#[from] notify::Error),

    #[error("edge process supervision ended: {0}")]
    Supervision(#[source] Arc<SpawnError>),

    #[error("failed to install signal handlers: {0}")]
    SignalHandlers(#[source] std::io::Error),

    #[error("failed to start passthrough listener: {0}")]
    Listener(#[source] std::io::Error),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}
