//! Core library for Docker image stats collection
//!
//! This crate provides:
//! - The collector's in-memory snapshot store and eviction sweeper
//! - Report ingestion and remote prune dispatch
//! - The agent's Docker measurement, pruning and reporting loop
//! - Health checks and observability

pub mod agent;
pub mod dispatch;
pub mod health;
pub mod ingest;
pub mod models;
pub mod observability;
pub mod store;

pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{AgentMetrics, CollectorMetrics, StructuredLogger};
