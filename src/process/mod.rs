//! Edge process supervision.
//!
//! # Data Flow
//! ```text
//! ProcessSpec (binary + fixed argument vector)
//!     → supervisor.rs spawns the child, hands it to the exit-watch task
//!     → exit-watch task: wait → log status → respawn (unless stopped)
//!     → SupervisorHandle: pid / state / restarts for everyone else
//!
//! controller reload
//!     → ProcessControl::signal_reload → SIGUSR1 to the running child
//! ```
//!
//! # Design Decisions
//! - The exit-watch task is the only writer of process state
//! - Every exit that was not requested through `stop()` is restarted
//! - Respawns are not rate limited

pub mod command;
pub mod supervisor;

pub use command::ProcessSpec;
pub use supervisor::{ProcessState, ProcessSupervisor, SupervisorHandle};

use thiserror::Error;

/// The edge process could not be started.
#[derive(Debug, Error)]
#[error("failed to start {binary}: {source}")]
pub struct SpawnError {
    pub binary: String,
    #[source]
    pub source: std::io::Error,
}

/// A signal could not be delivered to the edge process.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("edge process is not running")]
    NotRunning,

    #[error("failed to signal pid {pid}: {source}")]
    Delivery {
        pid: u32,
        #[source]
        source: nix::errno::Errno,
    },
}

/// Control surface of a supervised process.
pub trait ProcessControl: Send + Sync {
    /// Ask the process to re-read its configuration.
    fn signal_reload(&self) -> Result<(), SignalError>;

    /// Pid of the running process, if any.
    fn pid(&self) -> Option<u32>;
}
