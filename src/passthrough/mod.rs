//! Layer-4 TLS passthrough.
//!
//! # Data Flow
//! ```text
//! client connects to the shared ingress port
//!     → proxy.rs accepts (bounded by a semaphore)
//!     → sni.rs peeks the ClientHello, extracts server_name
//!     → table.rs maps hostname → backend address
//!     → proxy.rs dials the backend, copies bytes both ways
//! ```
//!
//! The ClientHello is peeked, never consumed, so the backend receives the
//! unmodified TLS stream and terminates TLS itself.

pub mod proxy;
pub mod sni;
pub mod table;

pub use proxy::{PassthroughProxy, ProxyDialError};
pub use sni::{inspect, peek_server_name, SniResult};
pub use table::PassthroughTable;
