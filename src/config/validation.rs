//! Settings validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check addresses parse before anything binds to them
//!
//! Returns every problem found, not just the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ControllerSettings;

/// A single semantic problem in the settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate controller settings.
pub fn validate_settings(settings: &ControllerSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.paths.template.is_empty() {
        errors.push(ValidationError::new("paths.template", "must not be empty"));
    }
    if settings.paths.config.is_empty() {
        errors.push(ValidationError::new("paths.config", "must not be empty"));
    }
    if settings.paths.binary.is_empty() {
        errors.push(ValidationError::new("paths.binary", "must not be empty"));
    }

    if settings.process.log_destination.is_empty() {
        errors.push(ValidationError::new("process.log_destination", "must not be empty"));
    }
    if let Some(ca) = &settings.process.acme_ca {
        if !(ca.starts_with("https://") || ca.starts_with("http://")) {
            errors.push(ValidationError::new("process.acme_ca", format!("'{}' is not an http(s) URL", ca)));
        }
    }

    let health = &settings.health;
    if !health.path.starts_with('/') {
        errors.push(ValidationError::new("health.path", "must start with '/'"));
    }
    if health.port == 0 {
        errors.push(ValidationError::new("health.port", "must be non-zero"));
    }
    if health.interval_secs == 0 {
        errors.push(ValidationError::new("health.interval_secs", "must be > 0"));
    }
    if health.timeout_secs == 0 {
        errors.push(ValidationError::new("health.timeout_secs", "must be > 0"));
    }

    let passthrough = &settings.passthrough;
    if passthrough.enabled {
        if let Err(e) = passthrough.bind_address.parse::<SocketAddr>() {
            errors.push(ValidationError::new(
                "passthrough.bind_address",
                format!("'{}': {}", passthrough.bind_address, e),
            ));
        }
    }
    if passthrough.max_connections == 0 {
        errors.push(ValidationError::new("passthrough.max_connections", "must be > 0"));
    }
    if passthrough.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("passthrough.connect_timeout_secs", "must be > 0"));
    }
    if passthrough.client_hello_timeout_secs == 0 {
        errors.push(ValidationError::new("passthrough.client_hello_timeout_secs", "must be > 0"));
    }
    // Record header plus at least a minimal ClientHello.
    if passthrough.max_client_hello_bytes < 64 {
        errors.push(ValidationError::new("passthrough.max_client_hello_bytes", "must be >= 64"));
    }

    let observability = &settings.observability;
    if observability.metrics_enabled {
        if let Err(e) = observability.metrics_address.parse::<SocketAddr>() {
            errors.push(ValidationError::new(
                "observability.metrics_address",
                format!("'{}': {}", observability.metrics_address, e),
            ));
        }
    }

    for resolver in &settings.resolvers {
        if resolver.parse::<std::net::IpAddr>().is_err() {
            errors.push(ValidationError::new("resolvers", format!("'{}' is not an IP address", resolver)));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_settings(&ControllerSettings::default()).is_ok());
    }

    #[test]
    fn reports_all_errors() {
        let mut settings = ControllerSettings::default();
        settings.health.path = "healthz".into();
        settings.passthrough.enabled = true;
        settings.passthrough.bind_address = "not-an-address".into();
        settings.passthrough.max_connections = 0;
        settings.resolvers.push("dns.local".into());

        let errors = validate_settings(&settings).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "health.path",
                "passthrough.bind_address",
                "passthrough.max_connections",
                "resolvers",
            ]
        );
    }

    #[test]
    fn bind_address_only_checked_when_enabled() {
        let mut settings = ControllerSettings::default();
        settings.passthrough.bind_address = "nope".into();
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn acme_ca_must_be_url() {
        let mut settings = ControllerSettings::default();
        settings.process.acme_ca = Some("acme-staging".into());
        let errors = validate_settings(&settings).unwrap_err();
        assert_eq!(errors[0].field, "process.acme_ca");
    }
}
