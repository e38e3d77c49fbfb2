//! Bounded TCP listener forwarding TLS connections by SNI.
//!
//! # Responsibilities
//! - Bind the shared ingress port
//! - Enforce `max_connections` via semaphore; accept waits for a free slot
//! - Route each connection by the SNI of its ClientHello
//! - Copy bytes in both directions until either side closes
//!
//! A failure affects only the connection it happened on.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Semaphore};

use crate::config::PassthroughSettings;
use crate::observability::metrics;
use crate::passthrough::sni::{peek_server_name, SniResult};
use crate::passthrough::table::PassthroughTable;

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Pause after a failed accept. EMFILE and ENFILE fail instantly until a
/// descriptor frees up.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Identifier used in log fields for one passthrough connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The mapped backend could not be reached.
#[derive(Debug, Error)]
pub enum ProxyDialError {
    #[error("connect to {address} timed out after {timeout:?}")]
    Timeout { address: String, timeout: Duration },

    #[error("connect to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },
}

pub struct PassthroughProxy {
    listener: TcpListener,
    table: PassthroughTable,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
    connect_timeout: Duration,
    client_hello_timeout: Duration,
    max_client_hello_bytes: usize,
}

impl PassthroughProxy {
    pub async fn bind(settings: &PassthroughSettings, table: PassthroughTable) -> io::Result<Self> {
        let addr: SocketAddr = settings
            .bind_address
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!(
            address = %listener.local_addr()?,
            max_connections = settings.max_connections,
            "Passthrough listener bound"
        );

        Ok(Self {
            listener,
            table,
            connection_limit: Arc::new(Semaphore::new(settings.max_connections)),
            max_connections: settings.max_connections,
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            client_hello_timeout: Duration::from_secs(settings.client_hello_timeout_secs),
            max_client_hello_bytes: settings.max_client_hello_bytes,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Accept and forward connections until shutdown.
    ///
    /// Connections already being forwarded are left to finish on their own.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let this = Arc::new(self);

        loop {
            let permit = tokio::select! {
                permit = Arc::clone(&this.connection_limit).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = shutdown.recv() => break,
            };

            let accepted = tokio::select! {
                accepted = this.listener.accept() => accepted,
                _ = shutdown.recv() => break,
            };

            let (stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept passthrough connection");
                    drop(permit);
                    if !accept_backoff(&mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            let id = ConnectionId::next();
            tracing::debug!(
                connection_id = %id,
                peer_addr = %peer,
                available_permits = this.connection_limit.available_permits(),
                "Connection accepted"
            );

            let proxy = Arc::clone(&this);
            tokio::spawn(async move {
                let _permit = permit;
                metrics::passthrough_opened();
                let result = proxy.handle(id, stream).await;
                metrics::passthrough_closed();
                metrics::record_passthrough(result);
            });
        }

        tracing::info!("Passthrough listener stopped");
    }

    async fn handle(&self, id: ConnectionId, mut client: TcpStream) -> &'static str {
        let sni = match peek_server_name(&client, self.max_client_hello_bytes, self.client_hello_timeout).await {
            Ok(sni) => sni,
            Err(e) => {
                tracing::debug!(connection_id = %id, error = %e, "No ClientHello received");
                return "no_sni";
            }
        };

        let hostname = match sni {
            SniResult::Found(hostname) => hostname,
            SniResult::NoServerName | SniResult::NeedMoreData => {
                tracing::debug!(connection_id = %id, "ClientHello carries no server name");
                return "no_sni";
            }
            SniResult::NotTls(reason) => {
                tracing::debug!(connection_id = %id, reason = %reason, "Connection is not TLS");
                return "no_sni";
            }
        };

        let Some(address) = self.table.lookup(&hostname) else {
            tracing::debug!(connection_id = %id, sni = %hostname, "No passthrough route");
            return "no_route";
        };

        let mut backend = match dial(&address, self.connect_timeout).await {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!(connection_id = %id, sni = %hostname, error = %e, "Passthrough dial failed");
                return "dial_failed";
            }
        };

        tracing::debug!(connection_id = %id, sni = %hostname, backend = %address, "Forwarding connection");

        match tokio::io::copy_bidirectional(&mut client, &mut backend).await {
            Ok((to_backend, to_client)) => {
                tracing::debug!(
                    connection_id = %id,
                    bytes_to_backend = to_backend,
                    bytes_to_client = to_client,
                    "Passthrough connection closed"
                );
                "forwarded"
            }
            Err(e) => {
                tracing::debug!(connection_id = %id, error = %e, "Passthrough connection aborted");
                "error"
            }
        }
    }
}

/// Wait out [`ACCEPT_BACKOFF`]. Returns `false` when shutdown arrives first.
async fn accept_backoff(shutdown: &mut broadcast::Receiver<()>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(ACCEPT_BACKOFF) => true,
        _ = shutdown.recv() => false,
    }
}

async fn dial(address: &str, timeout: Duration) -> Result<TcpStream, ProxyDialError> {
    match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
        Ok(Ok(stream)) => {
            let _ = stream.set_nodelay(true);
            Ok(stream)
        }
        Ok(Err(source)) => Err(ProxyDialError::Connect {
            address: address.to_string(),
            source,
        }),
        Err(_) => Err(ProxyDialError::Timeout {
            address: address.to_string(),
            timeout,
        }),
    }
}
