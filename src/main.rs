// src/main.rs
use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

use tcp_load_balancer::{
    config,
    health::HealthChecker,
    load_balancer::create_load_balancer,
    proxy::{BackendPool, Proxy},
    server::{ConnectionHandler, ServerBuilder},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tcp_load_balancer=debug".parse()?),
        )
        .init();

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            config::load_config(&path).await?
        }
        None => {
            info!("No configuration file given, using built-in defaults");
            config::default_config()?
        }
    };

    let pool = BackendPool::new(config.backends.clone());
    let balancer = create_load_balancer(config.load_balancer.algorithm);
    info!(
        algorithm = balancer.name(),
        dial_failure_policy = ?config.load_balancer.dial_failure_policy,
        backends = config.backends.len(),
        "Backend pool configured"
    );

    // Populate the healthy set before any connection is accepted
    let checker = Arc::new(HealthChecker::new(config.health_check.clone(), pool.clone()));
    checker.check_all_backends().await;
    let checker_task = tokio::spawn(checker.clone().start());

    let proxy = Arc::new(Proxy::new(
        pool,
        balancer,
        config.load_balancer.dial_failure_policy,
        &config.proxy,
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let server = ServerBuilder::new(config.listen_addr.clone())
        .with_handler(ConnectionHandler::new(proxy))
        .with_max_connections(config.proxy.max_connections)
        .with_shutdown(shutdown_rx)
        .bind()
        .await?;

    let server_task = tokio::spawn(server.run());

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
    checker.shutdown();

    let _ = server_task.await;
    let _ = checker_task.await;
    info!("Load balancer stopped");

    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(%err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
