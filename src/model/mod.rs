//! Desired-state model handed to the controller on every update cycle.
//!
//! # Data Flow
//! ```text
//! orchestrator (resource watch, endpoint resolution)
//!     → ConfigModel (immutable value, one per update)
//!     → template context → rendered artifact
//!     → tcp_passthrough → passthrough mapping table
//! ```
//!
//! Sets and maps use ordered collections so that serializing the same model
//! twice always produces the same byte sequence.

pub mod l4;
pub mod policy;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use l4::{resolve_l4, L4Mapping, ResolveError, ServicePort, ServiceRef};
pub use policy::BackendPolicy;

/// Path that matches every request of a server.
pub const CATCH_ALL_PATH: &str = "/";

/// Root of the desired state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigModel {
    /// Upstream groups, in orchestrator order.
    pub backends: Vec<Backend>,

    /// Virtual hosts, in orchestrator order.
    pub servers: Vec<Server>,

    /// Raw TCP passthrough mappings (SNI hostname → backend address).
    pub tcp_passthrough: BTreeSet<L4Mapping>,

    /// Raw UDP passthrough mappings.
    pub udp_passthrough: BTreeSet<L4Mapping>,

    /// Free-form global settings made available to the template.
    pub global_settings: BTreeMap<String, String>,
}

impl ConfigModel {
    /// Look up a backend by name.
    pub fn backend(&self, name: &str) -> Option<&Backend> {
        self.backends.iter().find(|b| b.name == name)
    }
}

/// A named group of network endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    pub name: String,

    #[serde(default)]
    pub endpoints: Vec<Endpoint>,

    #[serde(default)]
    pub policy: BackendPolicy,
}

impl Backend {
    pub fn new(name: impl Into<String>, endpoints: Vec<Endpoint>) -> Self {
        Self {
            name: name.into(),
            endpoints,
            policy: BackendPolicy::default(),
        }
    }
}

/// A single `host:port` upstream endpoint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Error returned when an endpoint string is not `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid endpoint '{0}': expected host:port")]
pub struct EndpointParseError(pub String);

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| EndpointParseError(s.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| EndpointParseError(s.to_string()))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(EndpointParseError(s.to_string()));
        }
        Ok(Endpoint::new(host, port))
    }
}

/// A virtual host entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub hostname: String,

    #[serde(default)]
    pub locations: Vec<Location>,
}

impl Server {
    pub fn new(hostname: impl Into<String>, locations: Vec<Location>) -> Self {
        Self {
            hostname: hostname.into(),
            locations,
        }
    }

    /// The `/` location, if the server has one.
    pub fn catch_all(&self) -> Option<&Location> {
        self.locations.iter().find(|l| l.is_catch_all())
    }
}

/// Path → backend reference inside a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub path: String,

    /// Name of the backend serving this path.
    pub backend: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<Redirect>,
}

impl Location {
    pub fn new(path: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            backend: backend.into(),
            redirect: None,
        }
    }

    pub fn with_redirect(mut self, target: impl Into<String>) -> Self {
        self.redirect = Some(Redirect {
            target: target.into(),
            code: default_redirect_code(),
        });
        self
    }

    pub fn is_catch_all(&self) -> bool {
        self.path == CATCH_ALL_PATH
    }

    /// The redirect, when it actually points somewhere else.
    ///
    /// A target that is empty or equal to the location's own path is not a redirect.
    pub fn effective_redirect(&self) -> Option<&Redirect> {
        self.redirect
            .as_ref()
            .filter(|r| !r.target.is_empty() && r.target != self.path)
    }
}

/// Rewrite/redirect target of a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub target: String,

    #[serde(default = "default_redirect_code")]
    pub code: u16,
}

fn default_redirect_code() -> u16 {
    301
}
