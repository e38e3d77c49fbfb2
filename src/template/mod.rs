//! Configuration rendering subsystem.
//!
//! # Data Flow
//! ```text
//! template source (file)
//!     → compiled.rs (parse into CompiledTemplate)
//!     → TemplateSlot (Arc swapped whole on hot reload)
//!
//! ConfigModel + EdgeSettings + health endpoint
//!     → context.rs (TemplateContext)
//!     → renderer.rs (render into reusable buffer)
//!     → artifact bytes
//!
//! FileChanged event
//!     → reloader.rs (compile, then swap; keep last-known-good on failure)
//! ```

pub mod compiled;
pub mod context;
pub mod error;
pub mod reloader;
pub mod renderer;

pub use compiled::CompiledTemplate;
pub use context::TemplateContext;
pub use error::{CompileError, RenderError};
pub use reloader::TemplateReloader;
pub use renderer::{TemplateRenderer, TemplateSlot};
