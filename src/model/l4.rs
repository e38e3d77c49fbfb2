//! Layer-4 passthrough mappings and their resolution from service ports.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hostname (or SNI) → backend `host:port` for raw passthrough.
///
/// Ordered by hostname first so a set of mappings serializes deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct L4Mapping {
    pub hostname: String,
    pub backend_address: String,
}

impl L4Mapping {
    pub fn new(hostname: impl Into<String>, backend_address: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            backend_address: backend_address.into(),
        }
    }
}

/// The parts of a cluster service needed to resolve a passthrough target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRef {
    pub name: String,
    pub cluster_address: String,
    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

/// A declared service port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    #[serde(default)]
    pub name: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("service {service} has no cluster address")]
    NoClusterAddress { service: String },

    #[error("service {service} has no port matching '{port}'")]
    UnknownPort { service: String, port: String },
}

/// Resolve a passthrough mapping against a service.
///
/// A numeric `port` is matched by value against the declared ports, anything
/// else is matched by port name.
pub fn resolve_l4(hostname: &str, service: &ServiceRef, port: &str) -> Result<L4Mapping, ResolveError> {
    if service.cluster_address.is_empty() {
        return Err(ResolveError::NoClusterAddress {
            service: service.name.clone(),
        });
    }

    let matched = match port.parse::<u16>() {
        Ok(number) => service.ports.iter().find(|p| p.port == number),
        Err(_) => service.ports.iter().find(|p| p.name == port),
    };

    let matched = matched.ok_or_else(|| ResolveError::UnknownPort {
        service: service.name.clone(),
        port: port.to_string(),
    })?;

    Ok(L4Mapping::new(
        hostname,
        format!("{}:{}", service.cluster_address, matched.port),
    ))
}
