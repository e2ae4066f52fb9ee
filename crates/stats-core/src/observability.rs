//! Observability infrastructure for the agent and the collector
//!
//! Provides:
//! - Prometheus metrics (stored snapshots, ingest, eviction and dispatch
//!   counters, dispatch latency; agent image size and prune counts)
//! - Structured JSON logging with tracing

use crate::agent::PruneSummary;
use crate::store::EvictionReason;
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Gauge, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for remote call latency (in seconds)
const DISPATCH_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Histogram buckets for Docker API latency (in seconds)
const MEASURE_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

static COLLECTOR_METRICS: OnceLock<CollectorMetricsInner> = OnceLock::new();
static AGENT_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct CollectorMetricsInner {
    snapshots: IntGauge,
    ingest_total: IntCounter,
    ingest_rejected: IntCounter,
    evictions: IntCounterVec,
    dispatch_total: IntCounterVec,
    dispatch_latency_seconds: Histogram,
}

impl CollectorMetricsInner {
    fn new() -> Self {
        Self {
            snapshots: register_int_gauge!(
                "docker_stats_snapshots",
                "Number of instances with a stored snapshot"
            )
            .expect("Failed to register snapshots"),

            ingest_total: register_int_counter!(
                "docker_stats_ingest_total",
                "Total number of accepted agent reports"
            )
            .expect("Failed to register ingest_total"),

            ingest_rejected: register_int_counter!(
                "docker_stats_ingest_rejected_total",
                "Total number of rejected agent reports"
            )
            .expect("Failed to register ingest_rejected_total"),

            evictions: register_int_counter_vec!(
                "docker_stats_evictions_total",
                "Snapshots removed by the sweeper",
                &["reason"]
            )
            .expect("Failed to register evictions_total"),

            dispatch_total: register_int_counter_vec!(
                "docker_stats_dispatch_total",
                "Manual prune dispatches by outcome",
                &["outcome"]
            )
            .expect("Failed to register dispatch_total"),

            dispatch_latency_seconds: register_histogram!(
                "docker_stats_dispatch_latency_seconds",
                "Time spent waiting for agents to acknowledge a prune",
                DISPATCH_BUCKETS.to_vec()
            )
            .expect("Failed to register dispatch_latency_seconds"),
        }
    }
}

/// Collector metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct CollectorMetrics {
    _private: (),
}

impl Default for CollectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectorMetrics {
    pub fn new() -> Self {
        COLLECTOR_METRICS.get_or_init(CollectorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &CollectorMetricsInner {
        COLLECTOR_METRICS.get_or_init(CollectorMetricsInner::new)
    }

    pub fn set_snapshots(&self, count: i64) {
        self.inner().snapshots.set(count);
    }

    pub fn inc_ingest(&self) {
        self.inner().ingest_total.inc();
    }

    pub fn inc_ingest_rejected(&self) {
        self.inner().ingest_rejected.inc();
    }

    pub fn inc_evictions(&self, reason: EvictionReason) {
        let label = match reason {
            EvictionReason::Malformed => "malformed",
            EvictionReason::Expired => "expired",
        };
        self.inner().evictions.with_label_values(&[label]).inc();
    }

    /// Count a dispatch by outcome label (`success` or an error kind)
    pub fn inc_dispatch(&self, outcome: &str) {
        self.inner()
            .dispatch_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn observe_dispatch_latency(&self, duration_secs: f64) {
        self.inner().dispatch_latency_seconds.observe(duration_secs);
    }
}

struct AgentMetricsInner {
    images_size_gb: Gauge,
    measure_latency_seconds: Histogram,
    prunes: IntCounterVec,
    prune_errors: IntCounter,
    report_errors: IntCounter,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            images_size_gb: register_gauge!(
                "docker_stats_agent_images_size_gb",
                "Total size of local Docker images in GB"
            )
            .expect("Failed to register images_size_gb"),

            measure_latency_seconds: register_histogram!(
                "docker_stats_agent_measure_latency_seconds",
                "Time spent listing images through the Docker API",
                MEASURE_BUCKETS.to_vec()
            )
            .expect("Failed to register measure_latency_seconds"),

            prunes: register_int_counter_vec!(
                "docker_stats_agent_prunes_total",
                "Completed prunes by trigger",
                &["trigger"]
            )
            .expect("Failed to register prunes_total"),

            prune_errors: register_int_counter!(
                "docker_stats_agent_prune_errors_total",
                "Total number of failed prunes"
            )
            .expect("Failed to register prune_errors_total"),

            report_errors: register_int_counter!(
                "docker_stats_agent_report_errors_total",
                "Total number of reports the collector did not accept"
            )
            .expect("Failed to register report_errors_total"),
        }
    }
}

/// Agent metrics for Prometheus exposition
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    pub fn new() -> Self {
        AGENT_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        AGENT_METRICS.get_or_init(AgentMetricsInner::new)
    }

    pub fn set_images_size_gb(&self, size_gb: f64) {
        self.inner().images_size_gb.set(size_gb);
    }

    pub fn observe_measure_latency(&self, duration_secs: f64) {
        self.inner().measure_latency_seconds.observe(duration_secs);
    }

    pub fn inc_prunes(&self, trigger: &str) {
        self.inner().prunes.with_label_values(&[trigger]).inc();
    }

    pub fn inc_prune_errors(&self) {
        self.inner().prune_errors.inc();
    }

    pub fn inc_report_errors(&self) {
        self.inner().report_errors.inc();
    }
}

/// Structured logger for lifecycle and prune events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log a stored report
    pub fn log_ingest(
        &self,
        instance_id: &str,
        images_size_gb: f64,
        prune_action: bool,
        timestamp: &str,
    ) {
        info!(
            event = "snapshot_ingested",
            node = %self.instance,
            instance_id = %instance_id,
            images_size_gb = images_size_gb,
            prune_action = prune_action,
            timestamp = %timestamp,
            "Stats received"
        );
    }

    /// Log a completed local prune
    pub fn log_prune(&self, trigger: &str, summary: &PruneSummary) {
        info!(
            event = "prune_completed",
            node = %self.instance,
            trigger = %trigger,
            containers_deleted = summary.containers_deleted,
            images_deleted = summary.images_deleted,
            space_reclaimed_bytes = summary.space_reclaimed_bytes,
            "Docker prune completed"
        );
    }

    /// Log a failed local prune
    pub fn log_prune_failed(&self, trigger: &str, error: &str) {
        warn!(
            event = "prune_failed",
            node = %self.instance,
            trigger = %trigger,
            error = %error,
            "Docker prune failed"
        );
    }

    /// Log startup
    pub fn log_startup(&self, role: &str, version: &str) {
        info!(
            event = "started",
            node = %self.instance,
            role = %role,
            version = %version,
            "Docker stats {} started",
            role
        );
    }

    /// Log shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "shutdown",
            node = %self.instance,
            reason = %reason,
            "Shutting down"
        );
    }
}
