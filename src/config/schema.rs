//! Controller settings schema.
//!
//! This module defines the static configuration of the controller itself (file
//! locations, process flags, health endpoint, passthrough bounds). The desired
//! traffic state arrives separately as a [`ConfigModel`](crate::model::ConfigModel).
//! All types derive Serde traits for deserialization from a TOML file.

use serde::{Deserialize, Serialize};

/// Default location of the rendering template.
pub const DEFAULT_TEMPLATE_PATH: &str = "/etc/Caddyfile.tmpl";

/// Default location of the rendered configuration artifact.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/Caddyfile";

/// Default supervised binary.
pub const DEFAULT_BINARY: &str = "/usr/bin/caddy";

/// Default ingress class handled by this controller.
pub const DEFAULT_INGRESS_CLASS: &str = "caddy";

/// Root configuration for the controller.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ControllerSettings {
    /// Template, artifact and binary locations.
    pub paths: PathsConfig,

    /// Supervised process flags.
    pub process: ProcessSettings,

    /// Internal health endpoint of the supervised process.
    pub health: HealthSettings,

    /// TLS passthrough listener.
    pub passthrough: PassthroughSettings,

    /// Template watcher tuning.
    pub watcher: WatcherSettings,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// DNS resolvers handed to the template.
    pub resolvers: Vec<String>,

    /// Ingress class this controller claims.
    pub ingress_class: Option<String>,
}

/// File locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Rendering template source.
    pub template: String,

    /// Rendered configuration read by the supervised process.
    pub config: String,

    /// Supervised binary. Overridden by `CADDY_BINARY`.
    pub binary: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE_PATH.to_string(),
            config: DEFAULT_CONFIG_PATH.to_string(),
            binary: DEFAULT_BINARY.to_string(),
        }
    }
}

/// Flags for the supervised process argument vector.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessSettings {
    /// Log destination passed to the process.
    pub log_destination: String,

    /// ACME directory endpoint; only passed when set.
    pub acme_ca: Option<String>,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            log_destination: "stdout".to_string(),
            acme_ca: None,
        }
    }
}

/// Health endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthSettings {
    /// Enable the periodic health monitor.
    pub enabled: bool,

    /// Host of the internal health endpoint (empty = loopback).
    pub host: String,

    /// Port of the internal health endpoint.
    pub port: u16,

    /// Path of the internal health endpoint.
    pub path: String,

    /// Probe interval in seconds.
    pub interval_secs: u64,

    /// Probe timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: String::new(),
            port: 12015,
            path: "/healthz".to_string(),
            interval_secs: 10,
            timeout_secs: 5,
        }
    }
}

/// Passthrough listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PassthroughSettings {
    /// Enable the SNI passthrough listener.
    pub enabled: bool,

    /// Bind address of the shared TLS ingress port.
    pub bind_address: String,

    /// Maximum concurrent passthrough connections (backpressure).
    pub max_connections: usize,

    /// Backend dial timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Time allowed for the client to send its ClientHello, in seconds.
    pub client_hello_timeout_secs: u64,

    /// Maximum bytes peeked while looking for the SNI.
    pub max_client_hello_bytes: usize,
}

impl Default for PassthroughSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "0.0.0.0:443".to_string(),
            max_connections: 4096,
            connect_timeout_secs: 5,
            client_hello_timeout_secs: 5,
            max_client_hello_bytes: 16 * 1024 + 5,
        }
    }
}

/// File watcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatcherSettings {
    /// Window during which bursts of file events are coalesced, in milliseconds.
    pub debounce_ms: u64,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self { debounce_ms: 250 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
