//! Operator overrides merged onto the edge defaults.
//!
//! # Responsibilities
//! - Decode the raw key/value map supplied through `SetConfig`
//! - Weakly type values (strings to bools, numbers, lists)
//! - Fall back to the default for anything that does not decode
//!
//! Decoding never fails as a whole: a bad value is logged and skipped.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::BackendPolicy;

/// Default log destination of the edge process.
pub const DEFAULT_LOG_LOCATION: &str = "stdout";

/// Global configuration rendered into the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSettings {
    /// Baseline per-backend policy.
    #[serde(flatten)]
    pub backend: BackendPolicy,

    /// Where the edge process writes its logs.
    pub log_location: String,
}

impl Default for EdgeSettings {
    fn default() -> Self {
        Self {
            backend: BackendPolicy::default(),
            log_location: DEFAULT_LOG_LOCATION.to_string(),
        }
    }
}

/// Merge the operator map onto the defaults.
pub fn read_overrides(src: &BTreeMap<String, String>) -> EdgeSettings {
    let mut to = EdgeSettings::default();

    for (key, value) in src {
        let value = value.trim();
        let applied = match key.as_str() {
            "log-location" => set_string(&mut to.log_location, value),
            "custom-http-errors" => set_list(&mut to.backend.custom_http_errors, value),
            "proxy-body-size" => set_string(&mut to.backend.proxy_body_size, value),
            "proxy-connect-timeout" => set_parsed(&mut to.backend.proxy_connect_timeout, value),
            "proxy-read-timeout" => set_parsed(&mut to.backend.proxy_read_timeout, value),
            "proxy-send-timeout" => set_parsed(&mut to.backend.proxy_send_timeout, value),
            "ssl-redirect" => set_bool(&mut to.backend.ssl_redirect, value),
            "force-ssl-redirect" => set_bool(&mut to.backend.force_ssl_redirect, value),
            "whitelist-source-range" => set_list(&mut to.backend.whitelist_source_range, value),
            "upstream-fail-timeout" => set_parsed(&mut to.backend.upstream_fail_timeout, value),
            "upstream-max-fails" => set_parsed(&mut to.backend.upstream_max_fails, value),
            _ => {
                tracing::debug!(key = %key, "Ignoring unknown configuration key");
                continue;
            }
        };

        if !applied {
            tracing::warn!(key = %key, value = %value, "Unexpected error merging defaults: keeping default");
        }
    }

    to
}

fn set_string(slot: &mut String, value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    *slot = value.to_string();
    true
}

fn set_parsed<T: FromStr>(slot: &mut T, value: &str) -> bool {
    match value.parse() {
        Ok(v) => {
            *slot = v;
            true
        }
        Err(_) => false,
    }
}

fn set_bool(slot: &mut bool, value: &str) -> bool {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => *slot = true,
        "false" | "0" | "no" | "off" => *slot = false,
        _ => return false,
    }
    true
}

fn set_list<T: FromStr>(slot: &mut Vec<T>, value: &str) -> bool {
    let parsed: Result<Vec<T>, _> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect();
    match parsed {
        Ok(list) => {
            *slot = list;
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn empty_map_yields_defaults() {
        assert_eq!(read_overrides(&BTreeMap::new()), EdgeSettings::default());
    }

    #[test]
    fn known_keys_are_weakly_typed() {
        let cfg = read_overrides(&map(&[
            ("custom-http-errors", "404, 503"),
            ("ssl-redirect", "false"),
            ("proxy-read-timeout", "120"),
            ("log-location", "/var/log/edge.log"),
            ("whitelist-source-range", "10.0.0.0/8,192.168.0.0/16"),
        ]));

        assert_eq!(cfg.backend.custom_http_errors, vec![404, 503]);
        assert!(!cfg.backend.ssl_redirect);
        assert_eq!(cfg.backend.proxy_read_timeout, 120);
        assert_eq!(cfg.log_location, "/var/log/edge.log");
        assert_eq!(cfg.backend.whitelist_source_range.len(), 2);
    }

    #[test]
    fn bad_values_keep_defaults() {
        let defaults = EdgeSettings::default();
        let cfg = read_overrides(&map(&[
            ("custom-http-errors", "404,oops"),
            ("ssl-redirect", "maybe"),
            ("proxy-read-timeout", "-1"),
            ("log-location", ""),
        ]));
        assert_eq!(cfg, defaults);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let cfg = read_overrides(&map(&[("enable-vts-status", "true")]));
        assert_eq!(cfg, EdgeSettings::default());
    }
}
