//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML) + environment
//!     → loader.rs (parse, env overrides)
//!     → validation.rs (semantic checks)
//!     → ControllerSettings (validated, immutable)
//!
//! orchestrator SetConfig(map)
//!     → overrides.rs (weakly typed merge onto defaults)
//!     → EdgeSettings (rendered into the artifact)
//!
//! template / model file edited
//!     → watcher.rs detects an effective change
//!     → FileChanged event to the single owning task
//! ```

pub mod loader;
pub mod overrides;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_settings, SettingsError};
pub use overrides::{read_overrides, EdgeSettings};
pub use schema::{
    ControllerSettings, HealthSettings, ObservabilityConfig, PassthroughSettings, PathsConfig,
    ProcessSettings, WatcherSettings,
};
pub use watcher::{FileChanged, FileWatcher, WatchGuard};
