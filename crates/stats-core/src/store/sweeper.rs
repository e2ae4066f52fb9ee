//! Periodic eviction of stale snapshots
//!
//! The sweeper wakes on a fixed interval and runs one pass over the
//! store. It owns no state beyond its configuration; stopping it is done
//! through the shutdown channel held by the composition root.

use super::{EvictionReason, SnapshotStore, DEFAULT_RETENTION};
use crate::health::{components, HealthRegistry};
use crate::observability::CollectorMetrics;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// Configuration for the eviction sweeper
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between sweeps (default: 30 minutes)
    pub interval: Duration,
    /// Maximum snapshot age (default: 24 hours)
    pub retention: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60),
            retention: DEFAULT_RETENTION,
        }
    }
}

/// Background task removing expired and malformed snapshots
pub struct EvictionSweeper {
    store: Arc<SnapshotStore>,
    config: SweepConfig,
    metrics: CollectorMetrics,
    health: HealthRegistry,
}

impl EvictionSweeper {
    pub fn new(
        store: Arc<SnapshotStore>,
        config: SweepConfig,
        metrics: CollectorMetrics,
        health: HealthRegistry,
    ) -> Self {
        Self {
            store,
            config,
            metrics,
            health,
        }
    }

    /// Run until a shutdown signal is received.
    ///
    /// A zero interval marks the sweeper unhealthy and returns at once.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if self.config.interval.is_zero() {
            error!("Sweep interval is zero, eviction sweeper not started");
            self.health
                .set_unhealthy(components::SWEEPER, "sweep interval must be non-zero")
                .await;
            return;
        }

        info!(
            interval_secs = self.config.interval.as_secs(),
            retention_secs = self.config.retention.as_secs(),
            "Starting eviction sweeper"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing can be stale yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once(Utc::now()).await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down eviction sweeper");
                    break;
                }
            }
        }
    }

    /// One full pass over the store as of `now`. Returns the number of
    /// evicted entries.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> usize {
        let evicted = self.store.sweep(now, self.config.retention).await;

        for eviction in &evicted {
            match eviction.reason {
                EvictionReason::Malformed => info!(
                    event = "snapshot_evicted",
                    instance_id = %eviction.instance_id,
                    reason = "malformed_timestamp",
                    "Cannot parse snapshot timestamp, removing"
                ),
                EvictionReason::Expired => info!(
                    event = "snapshot_evicted",
                    instance_id = %eviction.instance_id,
                    reason = "expired",
                    "Snapshot is older than the retention window, removing"
                ),
            }
            self.metrics.inc_evictions(eviction.reason);
        }

        let remaining = self.store.len().await;
        self.metrics.set_snapshots(remaining as i64);
        debug!(evicted = evicted.len(), remaining, "Sweep complete");
        self.health.set_healthy(components::SWEEPER).await;

        evicted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ComponentStatus;
    use crate::models::{Snapshot, StatsReport};
    use chrono::TimeZone;

    fn snapshot(id: &str, timestamp: &str) -> Snapshot {
        Snapshot::from_report(StatsReport {
            instance_id: id.to_string(),
            images_size_gb: 1.0,
            timestamp: timestamp.to_string(),
            prune_action: false,
        })
    }

    #[test]
    fn test_sweep_config_default() {
        let config = SweepConfig::default();
        assert_eq!(config.interval, Duration::from_secs(1800));
        assert_eq!(config.retention, Duration::from_secs(86400));
    }

    #[tokio::test]
    async fn test_sweep_once_counts_evictions() {
        let store = Arc::new(SnapshotStore::new());
        store.upsert(snapshot("old", "2024-01-01T00:00:00Z")).await;
        store.upsert(snapshot("bad", "not-a-time")).await;
        store.upsert(snapshot("new", "2024-01-02T23:00:00Z")).await;

        let sweeper = EvictionSweeper::new(
            store.clone(),
            SweepConfig::default(),
            CollectorMetrics::new(),
            HealthRegistry::new(),
        );
        let now = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();

        assert_eq!(sweeper.sweep_once(now).await, 2);
        assert_eq!(store.len().await, 1);
        assert!(store.get("new").await.is_some());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(SnapshotStore::new());
        let sweeper = EvictionSweeper::new(
            store,
            SweepConfig {
                interval: Duration::from_millis(10),
                retention: DEFAULT_RETENTION,
            },
            CollectorMetrics::new(),
            HealthRegistry::new(),
        );

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(sweeper.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_sweeps_on_tick() {
        let store = Arc::new(SnapshotStore::new());
        store.upsert(snapshot("bad", "garbage")).await;

        let sweeper = EvictionSweeper::new(
            store.clone(),
            SweepConfig {
                interval: Duration::from_millis(10),
                retention: DEFAULT_RETENTION,
            },
            CollectorMetrics::new(),
            HealthRegistry::new(),
        );

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(sweeper.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_sweep_once_marks_sweeper_healthy() {
        let health = HealthRegistry::new();
        health
            .set_unhealthy(components::SWEEPER, "not yet run")
            .await;
        let sweeper = EvictionSweeper::new(
            Arc::new(SnapshotStore::new()),
            SweepConfig::default(),
            CollectorMetrics::new(),
            health.clone(),
        );

        sweeper.sweep_once(Utc::now()).await;

        let status = health.health().await.components[components::SWEEPER].status;
        assert_eq!(status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_zero_interval_reports_unhealthy_without_panicking() {
        let health = HealthRegistry::new();
        health.register(components::SWEEPER).await;
        health.set_ready(true).await;
        let sweeper = EvictionSweeper::new(
            Arc::new(SnapshotStore::new()),
            SweepConfig {
                interval: Duration::ZERO,
                retention: DEFAULT_RETENTION,
            },
            CollectorMetrics::new(),
            health.clone(),
        );

        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            tokio::spawn(sweeper.run(shutdown_rx)),
        )
        .await
        .expect("sweeper did not return");
        assert!(result.is_ok(), "sweeper task panicked");

        let status = health.health().await.components[components::SWEEPER].status;
        assert_eq!(status, ComponentStatus::Unhealthy);
        assert!(!health.readiness().await.ready);
    }
}
