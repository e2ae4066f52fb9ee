//! Remote prune dispatch
//!
//! The collector triggers a prune on an agent with a single outbound call
//! and, when the agent acknowledges it, drops the agent's stale snapshot:
//! - `PruneDispatcher` abstracts the outbound call (HTTP in production)
//! - `DispatchController` runs one request and applies the store update

mod client;
mod controller;

pub use client::{AgentAddressing, HttpPruneDispatcher, DEFAULT_AGENT_PORT};
pub use controller::{DispatchController, DispatchOutcome};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from a prune dispatch. Every variant leaves the store untouched.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("instance parameter is required")]
    MissingInstance,

    #[error("cannot build agent address for {instance_id}: {reason}")]
    InvalidAddress { instance_id: String, reason: String },

    #[error("agent unreachable: {0}")]
    Unreachable(String),

    #[error("agent did not answer within {0:?}")]
    Timeout(Duration),

    #[error("agent returned status {0}")]
    Status(u16),
}

impl DispatchError {
    /// True when the failure is the caller's fault rather than the agent's
    pub fn is_client_error(&self) -> bool {
        matches!(self, DispatchError::MissingInstance)
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::MissingInstance => "missing_instance",
            DispatchError::InvalidAddress { .. } => "invalid_address",
            DispatchError::Unreachable(_) => "unreachable",
            DispatchError::Timeout(_) => "timeout",
            DispatchError::Status(_) => "bad_status",
        }
    }
}

/// Outbound "trigger prune" call to one agent
#[async_trait]
pub trait PruneDispatcher: Send + Sync {
    /// Ask the agent for `instance_id` to prune. Exactly one attempt.
    async fn trigger_prune(&self, instance_id: &str) -> Result<(), DispatchError>;
}
