// src/health/status.rs
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    Refused,
    TimedOut,
}

impl ProbeOutcome {
    pub fn is_healthy(self) -> bool {
        self == ProbeOutcome::Reachable
    }
}

#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    pub backend: String,
    pub outcome: ProbeOutcome,
    pub response_time_ms: u64,
}

/// Result of one full health check pass.
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Reachable backends, in configured order.
    pub healthy: Vec<String>,
    pub total: usize,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn unhealthy_count(&self) -> usize {
        self.total - self.healthy.len()
    }
}
