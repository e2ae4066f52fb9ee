//! Agent scheduling loop
//!
//! Reports image usage on one timer and prunes automatically on another.
//! Manual prunes triggered over HTTP go through the same `AgentTasks`.

use super::{ImageRuntime, PruneSummary, StatsReporter};
use crate::health::{components, HealthRegistry};
use crate::models::StatsReport;
use crate::observability::{AgentMetrics, StructuredLogger};
use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// What started a prune
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneTrigger {
    /// Daily automatic prune
    Scheduled,
    /// Requested by the collector
    Manual,
}

impl PruneTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            PruneTrigger::Scheduled => "scheduled",
            PruneTrigger::Manual => "manual",
        }
    }
}

/// Timer configuration for the agent loop
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Interval between stats reports (default: 1 hour)
    pub stats_interval: Duration,
    /// Interval between automatic prunes (default: 24 hours)
    pub prune_interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            stats_interval: Duration::from_secs(60 * 60),
            prune_interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// The agent's two jobs: report usage, and prune then report
pub struct AgentTasks {
    instance_id: String,
    runtime: Arc<dyn ImageRuntime>,
    reporter: StatsReporter,
    health: HealthRegistry,
    metrics: AgentMetrics,
    logger: StructuredLogger,
}

impl AgentTasks {
    pub fn new(
        instance_id: impl Into<String>,
        runtime: Arc<dyn ImageRuntime>,
        reporter: StatsReporter,
        health: HealthRegistry,
        metrics: AgentMetrics,
    ) -> Self {
        let instance_id = instance_id.into();
        Self {
            logger: StructuredLogger::new(instance_id.clone()),
            instance_id,
            runtime,
            reporter,
            health,
            metrics,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Measure local image usage and send it to the collector
    pub async fn report_stats(&self) -> Result<StatsReport> {
        let start = Instant::now();
        let size_gb = match self.runtime.images_size_gb().await {
            Ok(size_gb) => size_gb,
            Err(e) => {
                self.health
                    .set_unhealthy(components::DOCKER, e.to_string())
                    .await;
                return Err(e.into());
            }
        };
        self.metrics
            .observe_measure_latency(start.elapsed().as_secs_f64());
        self.metrics.set_images_size_gb(size_gb);
        self.health.set_healthy(components::DOCKER).await;

        let report = StatsReport::measurement(self.instance_id.clone(), size_gb);
        self.deliver(&report).await?;
        Ok(report)
    }

    /// Prune, then report a zero-size measurement flagged as a prune.
    ///
    /// No report is sent when the prune itself fails.
    pub async fn run_prune(&self, trigger: PruneTrigger) -> Result<PruneSummary> {
        let summary = match self.runtime.prune().await {
            Ok(summary) => summary,
            Err(e) => {
                self.metrics.inc_prune_errors();
                self.logger.log_prune_failed(trigger.as_str(), &e.to_string());
                return Err(e.into());
            }
        };
        self.metrics.inc_prunes(trigger.as_str());
        self.logger.log_prune(trigger.as_str(), &summary);

        self.deliver(&StatsReport::after_prune(self.instance_id.clone()))
            .await?;
        Ok(summary)
    }

    async fn deliver(&self, report: &StatsReport) -> Result<()> {
        match self.reporter.send(report).await {
            Ok(()) => {
                self.health.set_healthy(components::REPORTER).await;
                Ok(())
            }
            Err(e) => {
                self.metrics.inc_report_errors();
                self.health
                    .set_degraded(components::REPORTER, e.to_string())
                    .await;
                Err(e.into())
            }
        }
    }
}

/// Periodic driver for `AgentTasks`
pub struct AgentLoop {
    tasks: Arc<AgentTasks>,
    config: ScheduleConfig,
}

impl AgentLoop {
    pub fn new(tasks: Arc<AgentTasks>, config: ScheduleConfig) -> Self {
        Self { tasks, config }
    }

    /// Run until a shutdown signal is received.
    ///
    /// Stats are reported immediately and then every `stats_interval`; the
    /// first automatic prune happens one `prune_interval` after start.
    /// Returns at once if either interval is zero.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if self.config.stats_interval.is_zero() || self.config.prune_interval.is_zero() {
            error!("Agent loop intervals must be non-zero, loop not started");
            return;
        }

        info!(
            instance_id = %self.tasks.instance_id(),
            stats_interval_secs = self.config.stats_interval.as_secs(),
            prune_interval_secs = self.config.prune_interval.as_secs(),
            "Starting agent loop"
        );

        let mut stats_ticker = interval(self.config.stats_interval);
        stats_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut prune_ticker = interval(self.config.prune_interval);
        prune_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        prune_ticker.tick().await;

        loop {
            tokio::select! {
                _ = stats_ticker.tick() => {
                    if let Err(e) = self.tasks.report_stats().await {
                        warn!(error = %e, "Stats report failed");
                    }
                }
                _ = prune_ticker.tick() => {
                    info!("Scheduled prune triggered");
                    if let Err(e) = self.tasks.run_prune(PruneTrigger::Scheduled).await {
                        warn!(error = %e, "Scheduled prune failed");
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down agent loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::RuntimeError;
    use async_trait::async_trait;
    use mockito::{Matcher, Server};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock runtime for testing
    struct MockRuntime {
        size_gb: f64,
        fail: bool,
        prune_count: AtomicUsize,
    }

    impl MockRuntime {
        fn new(size_gb: f64, fail: bool) -> Self {
            Self {
                size_gb,
                fail,
                prune_count: AtomicUsize::new(0),
            }
        }

        fn failure() -> RuntimeError {
            RuntimeError::Docker(bollard::errors::Error::DockerResponseServerError {
                status_code: 500,
                message: "daemon unavailable".to_string(),
            })
        }
    }

    #[async_trait]
    impl ImageRuntime for MockRuntime {
        async fn images_size_gb(&self) -> Result<f64, RuntimeError> {
            if self.fail {
                return Err(Self::failure());
            }
            Ok(self.size_gb)
        }

        async fn prune(&self) -> Result<PruneSummary, RuntimeError> {
            if self.fail {
                return Err(Self::failure());
            }
            self.prune_count.fetch_add(1, Ordering::SeqCst);
            Ok(PruneSummary {
                containers_deleted: 1,
                images_deleted: 2,
                space_reclaimed_bytes: 1024,
            })
        }
    }

    fn tasks(server: &Server, runtime: Arc<MockRuntime>, health: HealthRegistry) -> AgentTasks {
        let reporter = StatsReporter::new(
            format!("{}/api/docker-stats", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();
        AgentTasks::new("agent-1", runtime, reporter, health, AgentMetrics::new())
    }

    #[test]
    fn test_schedule_config_default() {
        let config = ScheduleConfig::default();
        assert_eq!(config.stats_interval, Duration::from_secs(3600));
        assert_eq!(config.prune_interval, Duration::from_secs(86400));
    }

    #[tokio::test]
    async fn test_report_stats_sends_measurement() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/docker-stats")
            .match_body(Matcher::PartialJsonString(
                r#"{"instance_id":"agent-1","images_size_gb":3.5,"prune_action":false}"#
                    .to_string(),
            ))
            .with_status(201)
            .create_async()
            .await;

        let tasks = tasks(&server, Arc::new(MockRuntime::new(3.5, false)), HealthRegistry::new());
        let report = tasks.report_stats().await.unwrap();

        assert_eq!(report.images_size_gb, 3.5);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_report_stats_skips_send_when_docker_fails() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/docker-stats")
            .expect(0)
            .create_async()
            .await;

        let health = HealthRegistry::new();
        let tasks = tasks(&server, Arc::new(MockRuntime::new(0.0, true)), health.clone());

        assert!(tasks.report_stats().await.is_err());
        mock.assert_async().await;

        let status = health.health().await.components[components::DOCKER].status;
        assert_eq!(status, crate::health::ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_run_prune_reports_zero_size() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/docker-stats")
            .match_body(Matcher::PartialJsonString(
                r#"{"instance_id":"agent-1","images_size_gb":0.0,"prune_action":true}"#
                    .to_string(),
            ))
            .with_status(201)
            .create_async()
            .await;

        let runtime = Arc::new(MockRuntime::new(9.0, false));
        let tasks = tasks(&server, runtime.clone(), HealthRegistry::new());

        let summary = tasks.run_prune(PruneTrigger::Manual).await.unwrap();

        assert_eq!(summary.images_deleted, 2);
        assert_eq!(runtime.prune_count.load(Ordering::SeqCst), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_prune_sends_no_report() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/docker-stats")
            .expect(0)
            .create_async()
            .await;

        let tasks = tasks(&server, Arc::new(MockRuntime::new(0.0, true)), HealthRegistry::new());

        assert!(tasks.run_prune(PruneTrigger::Scheduled).await.is_err());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_loop_reports_on_start_and_stops() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/docker-stats")
            .with_status(201)
            .expect_at_least(1)
            .create_async()
            .await;

        let tasks = Arc::new(tasks(
            &server,
            Arc::new(MockRuntime::new(1.0, false)),
            HealthRegistry::new(),
        ));
        let agent_loop = AgentLoop::new(tasks, ScheduleConfig::default());

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(agent_loop.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("agent loop did not stop")
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_loop_with_zero_interval_returns_without_reporting() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/docker-stats")
            .expect(0)
            .create_async()
            .await;

        let tasks = Arc::new(tasks(
            &server,
            Arc::new(MockRuntime::new(1.0, false)),
            HealthRegistry::new(),
        ));
        let agent_loop = AgentLoop::new(
            tasks,
            ScheduleConfig {
                stats_interval: Duration::ZERO,
                prune_interval: Duration::from_secs(60),
            },
        );

        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::time::timeout(Duration::from_secs(1), tokio::spawn(agent_loop.run(shutdown_rx)))
            .await
            .expect("agent loop did not return")
            .expect("agent loop panicked");

        mock.assert_async().await;
    }
}
