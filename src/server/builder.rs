// ────────────────────────────────
// src/server/builder.rs
// ────────────────────────────────
use crate::server::handler::ConnectionHandler;
use crate::server::listener::bind_tcp;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};

/// Builder pattern so `main.rs` can inject its handler and shutdown signal.
pub struct ServerBuilder {
    addr: String,
    handler: Option<ConnectionHandler>,
    max_connections: Option<usize>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl ServerBuilder {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            handler: None,
            max_connections: None,
            shutdown: None,
        }
    }

    pub fn with_handler(mut self, handler: ConnectionHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Reject connections beyond `limit` concurrently proxied ones.
    pub fn with_max_connections(mut self, limit: Option<usize>) -> Self {
        self.max_connections = limit;
        self
    }

    /// Stop accepting once the receiver observes `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Bind the listen address. Failing here is fatal for the process.
    pub async fn bind(self) -> Result<Server> {
        let handler = self
            .handler
            .context("handler must be set via with_handler()")?;
        let listener = bind_tcp(&self.addr).await?;

        Ok(Server {
            listener,
            handler,
            limiter: self.max_connections.map(|n| Arc::new(Semaphore::new(n))),
            shutdown: self.shutdown,
        })
    }
}

pub struct Server {
    listener: TcpListener,
    handler: ConnectionHandler,
    limiter: Option<Arc<Semaphore>>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Server {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop. Runs until the shutdown signal fires; accept errors are
    /// logged and never end the loop.
    pub async fn run(self) {
        let Server {
            listener,
            handler,
            limiter,
            mut shutdown,
        } = self;

        if let Ok(addr) = listener.local_addr() {
            tracing::info!("Load balancer listening on {}", addr);
        }

        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = shutdown_requested(&mut shutdown) => break,
            };

            let (stream, peer) = match accepted {
                Ok(conn) => conn,
                Err(err) => {
                    tracing::warn!(%err, "Failed to accept new connection");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
            };

            let permit = match &limiter {
                Some(limiter) => match limiter.clone().try_acquire_owned() {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        tracing::warn!(%peer, "Connection rejected: max connections reached");
                        continue;
                    }
                },
                None => None,
            };

            let handler = handler.clone();
            tokio::spawn(async move {
                handler.handle(stream, peer).await;
                drop(permit);
            });
        }

        tracing::info!("Listener stopped accepting connections");
    }
}

/// Resolves once the receiver observes `true`. Without a receiver, or once
/// its sender is gone, it never resolves.
async fn shutdown_requested(shutdown: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = shutdown else {
        return std::future::pending().await;
    };

    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}
