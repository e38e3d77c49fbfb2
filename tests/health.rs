//! Health probe against mock endpoints.

mod common;

use std::time::Duration;

use edge_ingress::config::HealthSettings;
use edge_ingress::health::{HealthCheckError, HealthProbe};

fn settings(addr: std::net::SocketAddr, timeout_secs: u64) -> HealthSettings {
    HealthSettings {
        host: addr.ip().to_string(),
        port: addr.port(),
        timeout_secs,
        ..Default::default()
    }
}

#[tokio::test]
async fn ok_endpoint_is_healthy() {
    let addr = common::start_status_endpoint("200 OK", Duration::ZERO).await;
    HealthProbe::new(&settings(addr, 2)).check().await.unwrap();
}

#[tokio::test]
async fn unavailable_endpoint_is_status_error() {
    let addr = common::start_status_endpoint("503 Service Unavailable", Duration::ZERO).await;
    let err = HealthProbe::new(&settings(addr, 2)).check().await.unwrap_err();
    assert!(matches!(err, HealthCheckError::Status { status, .. } if status.as_u16() == 503));
}

#[tokio::test]
async fn closed_port_is_transport_error() {
    let addr = common::closed_port().await;
    let err = HealthProbe::new(&settings(addr, 2)).check().await.unwrap_err();
    assert!(matches!(err, HealthCheckError::Transport { .. }));
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let addr = common::start_status_endpoint("200 OK", Duration::from_secs(5)).await;
    let err = HealthProbe::new(&settings(addr, 1)).check().await.unwrap_err();
    assert!(matches!(err, HealthCheckError::Timeout { .. }));
}
