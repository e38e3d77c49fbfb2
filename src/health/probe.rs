//! HTTP probe of the edge process's health endpoint.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::Empty;
use hyper::{Request, StatusCode};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

use crate::config::HealthSettings;

const USER_AGENT: &str = "edge-ingress-health-check";

#[derive(Debug, Error)]
pub enum HealthCheckError {
    #[error("invalid health check request for {uri}: {source}")]
    Request {
        uri: String,
        #[source]
        source: hyper::http::Error,
    },

    #[error("health check of {uri} failed: {source}")]
    Transport {
        uri: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("health check of {uri} returned {status}")]
    Status { uri: String, status: StatusCode },

    #[error("health check of {uri} timed out after {timeout:?}")]
    Timeout { uri: String, timeout: Duration },
}

/// Probes `GET http://<host>:<port><path>`; only `200 OK` is healthy.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    client: Client<HttpConnector, Empty<Bytes>>,
    uri: String,
    timeout: Duration,
}

impl HealthProbe {
    pub fn new(settings: &HealthSettings) -> Self {
        let host = if settings.host.is_empty() {
            "127.0.0.1"
        } else {
            settings.host.as_str()
        };

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            client,
            uri: format!("http://{}:{}{}", host, settings.port, settings.path),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub async fn check(&self) -> Result<(), HealthCheckError> {
        let request = Request::builder()
            .method("GET")
            .uri(&self.uri)
            .header("user-agent", USER_AGENT)
            .body(Empty::<Bytes>::new())
            .map_err(|source| HealthCheckError::Request {
                uri: self.uri.clone(),
                source,
            })?;

        let response = match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(source)) => {
                return Err(HealthCheckError::Transport {
                    uri: self.uri.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(HealthCheckError::Timeout {
                    uri: self.uri.clone(),
                    timeout: self.timeout,
                })
            }
        };

        if response.status() != StatusCode::OK {
            return Err(HealthCheckError::Status {
                uri: self.uri.clone(),
                status: response.status(),
            });
        }
        Ok(())
    }
}
