//! Per-backend policy defaults.
//!
//! These are the baseline values the orchestrator merges resource annotations
//! onto before it produces a [`Backend`](super::Backend).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendPolicy {
    /// Status codes answered with a custom error page.
    pub custom_http_errors: Vec<u16>,

    /// Maximum request body size, in the edge proxy's size notation (e.g. "1m").
    pub proxy_body_size: String,

    /// Upstream connect timeout in seconds.
    pub proxy_connect_timeout: u64,

    /// Upstream read timeout in seconds.
    pub proxy_read_timeout: u64,

    /// Upstream send timeout in seconds.
    pub proxy_send_timeout: u64,

    /// Redirect plain HTTP to HTTPS when the server has TLS.
    pub ssl_redirect: bool,

    /// Redirect plain HTTP to HTTPS even without TLS on the server.
    pub force_ssl_redirect: bool,

    /// CIDR ranges allowed to reach the backend. Empty = everyone.
    pub whitelist_source_range: Vec<String>,

    /// Seconds an endpoint is considered down after `upstream_max_fails`.
    pub upstream_fail_timeout: u64,

    /// Failures before an endpoint is considered down.
    pub upstream_max_fails: u32,
}

impl Default for BackendPolicy {
    fn default() -> Self {
        Self {
            custom_http_errors: Vec::new(),
            proxy_body_size: "1m".to_string(),
            proxy_connect_timeout: 5,
            proxy_read_timeout: 60,
            proxy_send_timeout: 60,
            ssl_redirect: true,
            force_ssl_redirect: false,
            whitelist_source_range: Vec::new(),
            upstream_fail_timeout: 0,
            upstream_max_fails: 0,
        }
    }
}

impl BackendPolicy {
    /// True when the backend asks for custom error pages.
    pub fn has_custom_errors(&self) -> bool {
        !self.custom_http_errors.is_empty()
    }
}
