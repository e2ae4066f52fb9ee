//! Agent configuration

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Agent configuration, read from `AGENT_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Identifier reported to the collector; must resolve to this host
    #[serde(default = "default_instance_id")]
    pub instance_id: String,

    /// Port for the prune trigger and health endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Collector ingest endpoint
    #[serde(default = "default_remote_server_url")]
    pub remote_server_url: String,

    /// Seconds between stats reports
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// Seconds between automatic prunes
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,

    /// Upper bound on one report request in seconds
    #[serde(default = "default_report_timeout")]
    pub report_timeout_secs: u64,
}

fn default_instance_id() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown-host".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_remote_server_url() -> String {
    "http://localhost:3000/api/docker-stats".to_string()
}

fn default_stats_interval() -> u64 {
    60 * 60
}

fn default_prune_interval() -> u64 {
    24 * 60 * 60
}

fn default_report_timeout() -> u64 {
    30
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("AGENT"))
            .build()
            .context("Failed to read agent configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Invalid agent configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject zero intervals and timeouts
    pub fn validate(&self) -> Result<()> {
        if self.stats_interval_secs == 0 {
            bail!("AGENT_STATS_INTERVAL_SECS must be greater than zero");
        }
        if self.prune_interval_secs == 0 {
            bail!("AGENT_PRUNE_INTERVAL_SECS must be greater than zero");
        }
        if self.report_timeout_secs == 0 {
            bail!("AGENT_REPORT_TIMEOUT_SECS must be greater than zero");
        }
        Ok(())
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_secs(self.report_timeout_secs)
    }
}
