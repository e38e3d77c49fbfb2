//! Logging and metrics.
//!
//! ```text
//! renderer, supervisor, passthrough, health monitor, controller
//!     → tracing events with structured fields → fmt layer on stdout
//!     → metrics counters/gauges → Prometheus exporter (when enabled)
//! ```
//!
//! The edge process writes its own logs to the destination passed with `-log`;
//! they are not routed through here.

pub mod logging;
pub mod metrics;
