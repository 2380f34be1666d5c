// src/health/checker.rs
use super::status::{HealthCheckResult, HealthReport, ProbeOutcome};
use crate::config::HealthCheckConfig;
use crate::proxy::BackendPool;
use chrono::Utc;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::time::{interval_at, timeout, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub struct HealthChecker {
    config: HealthCheckConfig,
    pool: BackendPool,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

impl HealthChecker {
    pub fn new(config: HealthCheckConfig, pool: BackendPool) -> Self {
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        Self {
            config,
            pool,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Periodic loop. The first check fires one interval from now; callers
    /// run [`HealthChecker::check_all_backends`] themselves before accepting
    /// traffic.
    pub async fn start(self: Arc<Self>) {
        let period = self.config.interval();
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown_rx = self.shutdown_rx.clone();

        info!("Starting health checker with interval: {:?}", period);

        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {
                    self.check_all_backends().await;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Health checker shutting down");
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Probes every configured backend concurrently and publishes the
    /// reachable ones to the pool in a single update.
    pub async fn check_all_backends(&self) -> HealthReport {
        let backends = self.pool.configured_backends();
        let probe_timeout = self.config.timeout();

        let results = futures::future::join_all(
            backends.iter().map(|addr| check_backend(addr, probe_timeout)),
        )
        .await;

        let mut reachable = Vec::with_capacity(results.len());
        for result in results {
            if result.outcome.is_healthy() {
                debug!(
                    backend = %result.backend,
                    response_time_ms = result.response_time_ms,
                    "Backend is healthy"
                );
                reachable.push(result.backend);
            } else {
                warn!(backend = %result.backend, outcome = ?result.outcome, "Backend is unhealthy");
            }
        }

        // The configured set may have shrunk while probes were in flight.
        let healthy = self.pool.publish_probe_results(reachable);
        let report = HealthReport {
            healthy,
            total: backends.len(),
            checked_at: Utc::now(),
        };

        info!(
            checked_at = %report.checked_at.to_rfc3339(),
            "Health check complete. Healthy backends: {}/{}",
            report.healthy.len(),
            report.total
        );

        report
    }
}

async fn check_backend(addr: &str, probe_timeout: Duration) -> HealthCheckResult {
    let start = std::time::Instant::now();
    let outcome = probe(addr, probe_timeout).await;

    HealthCheckResult {
        backend: addr.to_string(),
        outcome,
        response_time_ms: start.elapsed().as_millis() as u64,
    }
}

/// Bare TCP connect; the connection is dropped as soon as it is established.
pub async fn probe(addr: &str, probe_timeout: Duration) -> ProbeOutcome {
    match timeout(probe_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            ProbeOutcome::Reachable
        }
        Ok(Err(_)) => ProbeOutcome::Refused,
        Err(_) => ProbeOutcome::TimedOut,
    }
}
