//! Periodic health reporting.
//!
//! Observes and logs; never restarts the process. Restarts belong to the
//! supervisor, which reacts to exits rather than to failed probes.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::health::probe::HealthProbe;
use crate::observability::metrics;

pub struct HealthMonitor {
    probe: HealthProbe,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(probe: HealthProbe, interval: Duration) -> Self {
        Self { probe, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            uri = %self.probe.uri(),
            interval_secs = self.interval.as_secs(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        let mut healthy: Option<bool> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let result = self.probe.check().await;
                    let now_healthy = result.is_ok();
                    metrics::record_health(now_healthy);

                    if healthy != Some(now_healthy) {
                        match &result {
                            Ok(()) => tracing::info!(uri = %self.probe.uri(), "Edge process healthy"),
                            Err(e) => tracing::warn!(error = %e, "Edge process unhealthy"),
                        }
                    }
                    healthy = Some(now_healthy);
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
