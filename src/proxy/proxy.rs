// ────────────────────────────────
// src/proxy/proxy.rs
// Per-connection TCP forwarding to a selected backend
// ────────────────────────────────

use super::pool::BackendPool;
use crate::config::{DialFailurePolicy, ProxyConfig};
use crate::load_balancer::LoadBalancer;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::copy_bidirectional;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub struct Proxy {
    pool: BackendPool,
    balancer: Arc<dyn LoadBalancer>,
    dial_failure_policy: DialFailurePolicy,
    connect_timeout: Option<Duration>,
}

/// Bytes moved over one proxied connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyStats {
    pub backend: String,
    pub client_to_backend: u64,
    pub backend_to_client: u64,
}

impl Proxy {
    pub fn new(
        pool: BackendPool,
        balancer: Arc<dyn LoadBalancer>,
        dial_failure_policy: DialFailurePolicy,
        config: &ProxyConfig,
    ) -> Self {
        Self {
            pool,
            balancer,
            dial_failure_policy,
            connect_timeout: config.connect_timeout(),
        }
    }

    /// Forwards `client` to a backend until either side closes. The client
    /// socket is closed on every return path.
    pub async fn handle(&self, mut client: TcpStream) -> Result<ProxyStats, ProxyError> {
        let guard = self.pool.acquire(self.balancer.as_ref())?;
        let backend_addr = guard.backend().to_string();

        info!(
            backend = %backend_addr,
            active = self.pool.connection_count(&backend_addr),
            policy = self.balancer.name(),
            "Forwarding connection"
        );

        let mut backend = match self.dial(&backend_addr).await {
            Ok(stream) => stream,
            Err(err) => {
                drop(guard);
                self.on_dial_failure(&backend_addr);
                return Err(err);
            }
        };

        client.set_nodelay(true)?;
        backend.set_nodelay(true)?;

        let (client_to_backend, backend_to_client) =
            copy_bidirectional(&mut client, &mut backend).await?;

        debug!(
            backend = %backend_addr,
            client_to_backend,
            backend_to_client,
            "Connection closed"
        );

        Ok(ProxyStats {
            backend: backend_addr,
            client_to_backend,
            backend_to_client,
        })
    }

    async fn dial(&self, addr: &str) -> Result<TcpStream, ProxyError> {
        let connect = TcpStream::connect(addr);
        let result = match self.connect_timeout {
            Some(limit) => timeout(limit, connect)
                .await
                .map_err(|_| ProxyError::ConnectTimeout(addr.to_string()))?,
            None => connect.await,
        };

        result.map_err(|source| ProxyError::BackendConnect {
            backend: addr.to_string(),
            source,
        })
    }

    fn on_dial_failure(&self, addr: &str) {
        match self.dial_failure_policy {
            DialFailurePolicy::Passive => {}
            DialFailurePolicy::Quarantine => {
                self.pool.quarantine(addr);
            }
            DialFailurePolicy::Evict => {
                if self.pool.evict(addr) {
                    warn!(backend = %addr, "Backend evicted after dial failure");
                }
            }
        }
    }
}

// Custom error type for proxy operations
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("No healthy backends available")]
    NoHealthyBackends,

    #[error("Failed to connect to backend {backend}: {source}")]
    BackendConnect {
        backend: String,
        #[source]
        source: io::Error,
    },

    #[error("Timed out connecting to backend {0}")]
    ConnectTimeout(String),

    #[error("Stream error: {0}")]
    Io(#[from] io::Error),
}

impl ProxyError {
    /// True when the backend could not be reached at all.
    pub fn is_dial_failure(&self) -> bool {
        matches!(self, Self::BackendConnect { .. } | Self::ConnectTimeout(_))
    }
}
