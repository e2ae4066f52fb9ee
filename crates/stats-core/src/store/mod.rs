//! In-memory snapshot store
//!
//! Holds the most recent measurement per instance behind a single
//! reader/writer lock. The store is an owned value: the composition root
//! wraps it in an `Arc` and hands clones to the HTTP handlers and to the
//! eviction sweeper, so tests can build isolated instances.

mod sweeper;


pub use sweeper::{EvictionSweeper, SweepConfig};

use crate::models::Snapshot;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Default retention window (24 hours)
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Why an entry was dropped during a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Timestamp could not be parsed at ingest
    Malformed,
    /// Older than the retention window
    Expired,
}

/// An entry removed by a sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    pub instance_id: String,
    pub reason: EvictionReason,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Snapshot>,
    next_generation: u64,
}

/// Mapping from instance id to its latest snapshot
#[derive(Debug, Default)]
pub struct SnapshotStore {
    inner: RwLock<Inner>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or wholesale-replace the entry for `snapshot.instance_id`.
    ///
    /// Returns the generation assigned to the stored value.
    pub async fn upsert(&self, mut snapshot: Snapshot) -> u64 {
        let mut inner = self.inner.write().await;
        inner.next_generation += 1;
        snapshot.generation = inner.next_generation;
        let generation = snapshot.generation;
        debug!(instance_id = %snapshot.instance_id, generation, "Upserting snapshot");
        inner.entries.insert(snapshot.instance_id.clone(), snapshot);
        generation
    }

    /// Point-in-time copy of every entry, in no particular order
    pub async fn list(&self) -> Vec<Snapshot> {
        self.inner.read().await.entries.values().cloned().collect()
    }

    /// Get the entry for an instance
    pub async fn get(&self, instance_id: &str) -> Option<Snapshot> {
        self.inner.read().await.entries.get(instance_id).cloned()
    }

    /// Generation of the current entry for an instance, if any
    pub async fn generation_of(&self, instance_id: &str) -> Option<u64> {
        self.inner
            .read()
            .await
            .entries
            .get(instance_id)
            .map(|s| s.generation)
    }

    /// Remove the entry for an instance. Absent ids are not an error.
    pub async fn remove(&self, instance_id: &str) -> Option<Snapshot> {
        self.inner.write().await.entries.remove(instance_id)
    }

    /// Remove the entry only if it still carries `generation`.
    ///
    /// An upsert that committed after `generation` was observed keeps its
    /// value. Returns true when an entry was removed.
    pub async fn remove_if_generation(&self, instance_id: &str, generation: u64) -> bool {
        let mut inner = self.inner.write().await;
        match inner.entries.get(instance_id) {
            Some(current) if current.generation == generation => {
                inner.entries.remove(instance_id);
                true
            }
            _ => false,
        }
    }

    /// Drop malformed entries and entries older than `retention` at `now`.
    ///
    /// Entries with a timestamp in the future relative to `now` are kept.
    pub async fn sweep(&self, now: DateTime<Utc>, retention: Duration) -> Vec<Eviction> {
        let mut inner = self.inner.write().await;
        let mut evicted = Vec::new();

        inner.entries.retain(|instance_id, snapshot| {
            let reason = match snapshot.observed_at {
                None => Some(EvictionReason::Malformed),
                Some(observed_at) => match now.signed_duration_since(observed_at).to_std() {
                    Ok(age) if age > retention => Some(EvictionReason::Expired),
                    _ => None,
                },
            };

            match reason {
                Some(reason) => {
                    evicted.push(Eviction {
                        instance_id: instance_id.clone(),
                        reason,
                    });
                    false
                }
                None => true,
            }
        });

        evicted
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}
