//! Manual prune control path

use super::{DispatchError, PruneDispatcher};
use crate::observability::CollectorMetrics;
use crate::store::SnapshotStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of a successful dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub instance_id: String,
    /// Whether the instance's snapshot was removed. False when there was
    /// no entry, or when a newer report arrived while the call was in flight.
    pub evicted: bool,
}

/// Runs prune requests: one remote call, then a conditional store removal
pub struct DispatchController {
    store: Arc<SnapshotStore>,
    dispatcher: Arc<dyn PruneDispatcher>,
    metrics: CollectorMetrics,
}

impl DispatchController {
    pub fn new(
        store: Arc<SnapshotStore>,
        dispatcher: Arc<dyn PruneDispatcher>,
        metrics: CollectorMetrics,
    ) -> Self {
        Self {
            store,
            dispatcher,
            metrics,
        }
    }

    /// Trigger a prune on `instance_id`.
    ///
    /// The store lock is not held during the remote call. The entry is
    /// removed only if it is still the one observed before dispatching.
    pub async fn prune(&self, instance_id: &str) -> Result<DispatchOutcome, DispatchError> {
        if instance_id.trim().is_empty() {
            self.metrics.inc_dispatch("missing_instance");
            return Err(DispatchError::MissingInstance);
        }

        info!(event = "prune_requested", instance_id = %instance_id, "Manual prune requested");
        let observed = self.store.generation_of(instance_id).await;

        let start = Instant::now();
        let result = self.dispatcher.trigger_prune(instance_id).await;
        self.metrics
            .observe_dispatch_latency(start.elapsed().as_secs_f64());

        if let Err(e) = result {
            warn!(
                event = "prune_failed",
                instance_id = %instance_id,
                error = %e,
                "Prune dispatch failed, keeping stored snapshot"
            );
            self.metrics.inc_dispatch(e.kind());
            return Err(e);
        }

        let evicted = match observed {
            Some(generation) => self.store.remove_if_generation(instance_id, generation).await,
            None => false,
        };

        if observed.is_some() && !evicted {
            debug!(
                instance_id = %instance_id,
                "Snapshot changed during dispatch, keeping newer report"
            );
        }

        info!(
            event = "prune_dispatched",
            instance_id = %instance_id,
            evicted,
            "Prune succeeded"
        );
        self.metrics.inc_dispatch("success");
        self.metrics.set_snapshots(self.store.len().await as i64);

        Ok(DispatchOutcome {
            instance_id: instance_id.to_string(),
            evicted,
        })
    }
}
