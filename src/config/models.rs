// src/config/models.rs
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    pub backends: Vec<String>,
    pub health_check: HealthCheckConfig,
    pub load_balancer: LoadBalancerConfig,
    pub proxy: ProxyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            backends: vec![
                "localhost:9001".to_string(),
                "localhost:9002".to_string(),
                "localhost:9003".to_string(),
            ],
            health_check: HealthCheckConfig::default(),
            load_balancer: LoadBalancerConfig::default(),
            proxy: ProxyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    pub interval_secs: u64,
    /// Per-probe connect timeout.
    pub timeout_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            timeout_secs: 2,
        }
    }
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadBalancerConfig {
    pub algorithm: LoadBalancerAlgorithm,
    pub dial_failure_policy: DialFailurePolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancerAlgorithm {
    RoundRobin,
    #[default]
    LeastConnections,
}

/// What the proxy does to a backend it selected but could not dial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialFailurePolicy {
    /// Leave membership to the health checker.
    #[default]
    Passive,
    /// Drop from the healthy set until the next successful probe.
    Quarantine,
    /// Remove from the configured set for the rest of the process lifetime.
    Evict,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Cap on concurrently proxied connections; unlimited when unset.
    pub max_connections: Option<usize>,
    pub connect_timeout_secs: Option<u64>,
}

impl ProxyConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("listen address must not be empty")]
    EmptyListenAddr,

    #[error("at least one backend must be configured")]
    NoBackends,

    #[error("backend address {0:?} is not of the form host:port")]
    InvalidBackend(String),

    #[error("backend {0} is listed more than once")]
    DuplicateBackend(String),

    #[error("health check interval must be greater than zero")]
    ZeroInterval,

    #[error("health check timeout must be greater than zero")]
    ZeroTimeout,

    #[error("proxy.max_connections must be greater than zero")]
    ZeroMaxConnections,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.trim().is_empty() {
            return Err(ConfigError::EmptyListenAddr);
        }
        if self.backends.is_empty() {
            return Err(ConfigError::NoBackends);
        }

        let mut seen = std::collections::HashSet::new();
        for backend in &self.backends {
            if !is_host_port(backend) {
                return Err(ConfigError::InvalidBackend(backend.clone()));
            }
            if !seen.insert(backend.as_str()) {
                return Err(ConfigError::DuplicateBackend(backend.clone()));
            }
        }

        if self.health_check.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.health_check.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.proxy.max_connections == Some(0) {
            return Err(ConfigError::ZeroMaxConnections);
        }

        Ok(())
    }
}

fn is_host_port(addr: &str) -> bool {
    match addr.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
