//! Template error types.

use thiserror::Error;

/// The template source could not be loaded or parsed.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to read template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid template {path}: {source}")]
    Syntax {
        path: String,
        #[source]
        source: minijinja::Error,
    },
}

/// The data could not be rendered with an otherwise valid template.
#[derive(Debug, Error)]
#[error("failed to render template {name}: {source}")]
pub struct RenderError {
    pub name: String,
    #[source]
    pub source: minijinja::Error,
}
