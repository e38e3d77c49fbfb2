//! Ingress edge controller.
//!
//! Renders a desired-state model into the configuration of a supervised edge
//! web server, reloads it only when the rendered bytes change, and forwards
//! TLS passthrough connections by SNI.

pub mod artifact;
pub mod config;
pub mod controller;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod passthrough;
pub mod process;
pub mod template;

pub use config::ControllerSettings;
pub use controller::{EdgeBackend, EdgeController, ReloadOutcome};
pub use error::ControllerError;
pub use lifecycle::Shutdown;
pub use model::ConfigModel;
