//! Rendered artifact persistence.
//!
//! # Data Flow
//! ```text
//! rendered bytes
//!     → gate.rs needs_reload (compare with the file on disk)
//!     → unchanged: nothing written, no signal
//!     → changed: gate.rs persist (temp file + rename)
//! ```

pub mod gate;

pub use gate::{ChangeGate, PersistError};
