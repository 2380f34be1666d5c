// src/health/mod.rs
mod checker;
mod status;

pub use checker::{probe, HealthChecker};
pub use status::{HealthCheckResult, HealthReport, ProbeOutcome};
