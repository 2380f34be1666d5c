// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use std::path::Path;

pub const LISTEN_ADDR_ENV: &str = "LB_LISTEN_ADDR";
pub const BACKENDS_ENV: &str = "LB_BACKENDS";

/// Load configuration from a file (YAML or JSON)
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let extension = path.extension().and_then(|s| s.to_str());
    let config: Config = if matches!(extension, Some("yaml" | "yml")) {
        serde_yaml::from_str(&contents).context("Failed to parse YAML config")?
    } else {
        serde_json::from_str(&contents).context("Failed to parse JSON config")?
    };

    finish(config)
}

/// Built-in defaults, still subject to environment overrides.
pub fn default_config() -> Result<Config> {
    finish(Config::default())
}

fn finish(mut config: Config) -> Result<Config> {
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn apply_env_overrides<F>(config: &mut Config, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(addr) = var(LISTEN_ADDR_ENV) {
        config.listen_addr = addr;
    }
    if let Some(list) = var(BACKENDS_ENV) {
        config.backends = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
}
