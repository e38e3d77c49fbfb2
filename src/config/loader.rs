//! Settings loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ControllerSettings;
use crate::config::validation::{validate_settings, ValidationError};

/// Environment variable overriding the supervised binary path.
pub const BINARY_ENV: &str = "CADDY_BINARY";

/// Error type for settings loading.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate settings from a TOML file, then apply environment overrides.
pub fn load_settings(path: &Path) -> Result<ControllerSettings, SettingsError> {
    let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut settings: ControllerSettings = toml::from_str(&content)?;

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    validate_settings(&settings).map_err(SettingsError::Validation)?;

    Ok(settings)
}

/// Default settings with environment overrides applied.
pub fn default_settings() -> Result<ControllerSettings, SettingsError> {
    let mut settings = ControllerSettings::default();
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    validate_settings(&settings).map_err(SettingsError::Validation)?;
    Ok(settings)
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(settings: &mut ControllerSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(binary) = lookup(BINARY_ENV).filter(|b| !b.is_empty()) {
        tracing::debug!(binary = %binary, "Supervised binary overridden from environment");
        settings.paths.binary = binary;
    }
}
