//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_renders_total` (counter): renders by result
//! - `edge_render_duration_seconds` (histogram): render latency
//! - `edge_reloads_total` (counter): reload attempts by result
//! - `edge_process_restarts_total` (counter): supervised process respawns
//! - `edge_template_reloads_total` (counter): template hot-swaps by result
//! - `edge_passthrough_connections_total` (counter): passthrough outcomes
//! - `edge_passthrough_active_connections` (gauge): open passthrough connections
//! - `edge_health_status` (gauge): 1=healthy, 0=unhealthy

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with an HTTP listener on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_render(success: bool, started: Instant) {
    let result = if success { "ok" } else { "error" };
    counter!("edge_renders_total", "result" => result).increment(1);
    histogram!("edge_render_duration_seconds").record(started.elapsed().as_secs_f64());
}

/// `result` is one of `reloaded`, `not_required`, `failed`.
pub fn record_reload(result: &'static str) {
    counter!("edge_reloads_total", "result" => result).increment(1);
}

pub fn record_process_restart() {
    counter!("edge_process_restarts_total").increment(1);
}

pub fn record_template_reload(success: bool) {
    let result = if success { "ok" } else { "error" };
    counter!("edge_template_reloads_total", "result" => result).increment(1);
}

/// `result` is one of `forwarded`, `no_route`, `no_sni`, `dial_failed`, `error`.
pub fn record_passthrough(result: &'static str) {
    counter!("edge_passthrough_connections_total", "result" => result).increment(1);
}

pub fn passthrough_opened() {
    gauge!("edge_passthrough_active_connections").increment(1.0);
}

pub fn passthrough_closed() {
    gauge!("edge_passthrough_active_connections").decrement(1.0);
}

pub fn record_health(healthy: bool) {
    gauge!("edge_health_status").set(if healthy { 1.0 } else { 0.0 });
}
