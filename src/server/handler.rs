// src/server/handler.rs
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::proxy::{Proxy, ProxyError};

/// Runs one accepted connection through the proxy inside its own span and
/// reports how it ended.
#[derive(Clone)]
pub struct ConnectionHandler {
    proxy: Arc<Proxy>,
}

impl ConnectionHandler {
    pub fn new(proxy: Arc<Proxy>) -> Self {
        Self { proxy }
    }

    pub async fn handle(&self, stream: TcpStream, peer: SocketAddr) {
        let span = tracing::info_span!("connection", id = %Uuid::new_v4(), %peer);

        async move {
            info!("Accepted connection");
            match self.proxy.handle(stream).await {
                Ok(stats) => {
                    info!(
                        backend = %stats.backend,
                        bytes_in = stats.client_to_backend,
                        bytes_out = stats.backend_to_client,
                        "Connection finished"
                    );
                }
                Err(ProxyError::NoHealthyBackends) => {
                    warn!("Failed to get a backend: no healthy backends available");
                }
                Err(err) if err.is_dial_failure() => {
                    warn!(%err, "Failed to connect to backend");
                }
                Err(err) => {
                    debug!(%err, "Connection ended with error");
                }
            }
        }
        .instrument(span)
        .await
    }
}
