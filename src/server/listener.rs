// ────────────────────────────────
// src/server/listener.rs
// Low-level TCP bind, kept apart from the accept loop.
// ────────────────────────────────
use anyhow::{Context, Result};
use tokio::net::TcpListener;

pub async fn bind_tcp(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to start listener on {addr}"))?;
    Ok(listener)
}
