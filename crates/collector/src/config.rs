//! Collector configuration

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Collector configuration, read from `COLLECTOR_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Port for the ingest, dashboard and prune endpoints
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Port every agent listens on
    #[serde(default = "default_agent_port")]
    pub agent_port: u16,

    /// Seconds between eviction sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Maximum snapshot age in seconds
    #[serde(default = "default_retention")]
    pub retention_secs: u64,

    /// Upper bound on a prune dispatch in seconds
    #[serde(default = "default_dispatch_timeout")]
    pub dispatch_timeout_secs: u64,
}

fn default_listen_port() -> u16 {
    3000
}

fn default_agent_port() -> u16 {
    8080
}

fn default_sweep_interval() -> u64 {
    30 * 60
}

fn default_retention() -> u64 {
    24 * 60 * 60
}

fn default_dispatch_timeout() -> u64 {
    30
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            agent_port: default_agent_port(),
            sweep_interval_secs: default_sweep_interval(),
            retention_secs: default_retention(),
            dispatch_timeout_secs: default_dispatch_timeout(),
        }
    }
}

impl CollectorConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("COLLECTOR"))
            .build()
            .context("Failed to read collector configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Invalid collector configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject durations that would stall the sweeper or fail every dispatch
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval_secs == 0 {
            bail!("COLLECTOR_SWEEP_INTERVAL_SECS must be greater than zero");
        }
        if self.retention_secs == 0 {
            bail!("COLLECTOR_RETENTION_SECS must be greater than zero");
        }
        if self.dispatch_timeout_secs == 0 {
            bail!("COLLECTOR_DISPATCH_TIMEOUT_SECS must be greater than zero");
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }
}
