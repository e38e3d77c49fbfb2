//! Orchestration of one update cycle.
//!
//! # Data Flow
//! ```text
//! ConfigModel (from the orchestrator or the model feed)
//!     → edge.rs on_update: overrides → context → render → passthrough table
//!     → ChangeGate: identical artifact → done
//!     → edge.rs reload: persist → SIGUSR1 to the edge process
//! ```
//!
//! Updates are serialized: `on_update`, `reload` and `sync` hold the same lock.

pub mod edge;
pub mod feed;

pub use edge::EdgeController;
pub use feed::ModelFeed;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ControllerError;
use crate::health::HealthCheckError;
use crate::model::{BackendPolicy, ConfigModel};

/// Build information reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendInfo {
    pub name: String,
    pub release: String,
    pub repository: String,
}

/// Result of a reload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Artifact persisted and the process signalled.
    Reloaded,
    /// Artifact identical to the persisted one; nothing written or signalled.
    NotRequired,
}

/// Capabilities an orchestrator needs from an edge backend.
#[allow(async_fn_in_trait)]
pub trait EdgeBackend: Send + Sync {
    fn name(&self) -> &str;

    fn info(&self) -> BackendInfo;

    fn default_ingress_class(&self) -> &str;

    /// Replace the operator overrides. `None` keeps the current ones.
    fn set_config(&self, overrides: Option<BTreeMap<String, String>>);

    /// Per-backend policy derived from the current overrides.
    fn backend_defaults(&self) -> BackendPolicy;

    /// Render `model`. Returns the artifact when it differs from the persisted one.
    async fn on_update(&self, model: &ConfigModel) -> Result<Option<Vec<u8>>, ControllerError>;

    /// Persist `artifact` and signal the process, unless it is already in place.
    async fn reload(&self, artifact: &[u8]) -> Result<ReloadOutcome, ControllerError>;

    async fn check(&self) -> Result<(), HealthCheckError>;
}
