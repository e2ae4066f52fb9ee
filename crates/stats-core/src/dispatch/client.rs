//! HTTP dispatcher that resolves agents by naming convention

use super::{DispatchError, PruneDispatcher};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

/// Port agents listen on by default
pub const DEFAULT_AGENT_PORT: u16 = 8080;

/// How an instance id maps to its agent's prune endpoint:
/// `{scheme}://{instance_id}:{port}{path}`
#[derive(Debug, Clone)]
pub struct AgentAddressing {
    pub scheme: String,
    pub port: u16,
    pub path: String,
}

impl Default for AgentAddressing {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            port: DEFAULT_AGENT_PORT,
            path: "/prune".to_string(),
        }
    }
}

impl AgentAddressing {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Resolve the prune URL for an instance
    pub fn prune_url(&self, instance_id: &str) -> Result<Url, DispatchError> {
        let invalid = |reason: String| DispatchError::InvalidAddress {
            instance_id: instance_id.to_string(),
            reason,
        };

        // Reject anything that would change the URL structure instead of
        // naming a host.
        if instance_id.is_empty()
            || instance_id
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@' | ':'))
        {
            return Err(invalid("not a valid host name".to_string()));
        }

        let raw = format!("{}://{}:{}{}", self.scheme, instance_id, self.port, self.path);
        Url::parse(&raw).map_err(|e| invalid(e.to_string()))
    }
}

/// Dispatcher issuing a zero-body `POST` to the agent
pub struct HttpPruneDispatcher {
    client: Client,
    addressing: AgentAddressing,
    timeout: Duration,
}

impl HttpPruneDispatcher {
    /// Create a dispatcher whose calls are bounded by `timeout`
    pub fn new(addressing: AgentAddressing, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            addressing,
            timeout,
        })
    }
}

#[async_trait]
impl PruneDispatcher for HttpPruneDispatcher {
    async fn trigger_prune(&self, instance_id: &str) -> Result<(), DispatchError> {
        let url = self.addressing.prune_url(instance_id)?;
        debug!(instance_id = %instance_id, url = %url, "Calling agent");

        let response = self.client.post(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DispatchError::Timeout(self.timeout)
            } else {
                DispatchError::Unreachable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status(status.as_u16()));
        }

        Ok(())
    }
}
