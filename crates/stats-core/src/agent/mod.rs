//! Agent side: measure local Docker image usage, prune, and report
//!
//! - `ImageRuntime` abstracts the Docker Engine API (`DockerRuntime`)
//! - `StatsReporter` posts reports to the collector
//! - `AgentLoop` drives periodic reports and automatic prunes

mod r#loop;
mod reporter;
mod runtime;

pub use r#loop::{AgentLoop, AgentTasks, PruneTrigger, ScheduleConfig};
pub use reporter::{ReportError, StatsReporter};
pub use runtime::{total_size_gb, DockerRuntime, ImageRuntime, PruneSummary, RuntimeError};

pub use async_trait::async_trait;
