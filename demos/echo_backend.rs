//! demos/echo_backend.rs
//! Run: cargo run --example echo_backend -- <port> [name]
//!
//! Greets each connection with `<name>\n`, then echoes everything back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("echo_backend=info".parse()?),
        )
        .init();

    let port: u16 = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "9001".into())
        .parse()?;
    let name = std::env::args()
        .nth(2)
        .unwrap_or_else(|| format!("backend-{port}"));

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, %name, "Echo backend listening");

    let served = Arc::new(AtomicU64::new(0));
    loop {
        let (mut socket, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                tracing::warn!(%err, "accept failed");
                continue;
            }
        };
        let n = served.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(%peer, connection = n, "client connected");

        let greeting = format!("{name}\n");
        tokio::spawn(async move {
            if socket.write_all(greeting.as_bytes()).await.is_err() {
                return;
            }
            let mut buf = [0u8; 1024];
            loop {
                let n = match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => n,
                };
                if socket.write_all(&buf[..n]).await.is_err() {
                    return;
                }
            }
        });
    }
}
