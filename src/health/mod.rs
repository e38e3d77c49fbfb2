//! Health checking of the edge process.
//!
//! # Data Flow
//! ```text
//! probe.rs:   GET http://<host>:<port><path> → 200 healthy, anything else an error
//! monitor.rs: periodic timer → probe → log transitions, set gauge
//! ```

pub mod monitor;
pub mod probe;

pub use monitor::HealthMonitor;
pub use probe::{HealthCheckError, HealthProbe};
