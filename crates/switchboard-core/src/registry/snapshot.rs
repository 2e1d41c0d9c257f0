//! Versioned, immutable registry snapshots
//!
//! A refresh never mutates a published snapshot. It builds a new one and
//! swaps the shared pointer, so in-flight selections keep the snapshot they
//! started with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use super::types::Worker;
use crate::error::{Error, Result};

/// Read-only view of every candidate worker at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Monotonic version, bumped on every publish
    pub version: u64,
    /// When the upstream registry produced this snapshot
    pub refreshed_at: DateTime<Utc>,
    pub workers: Vec<Worker>,
}

impl RegistrySnapshot {
    pub fn new(version: u64, workers: Vec<Worker>) -> Self {
        Self {
            version,
            refreshed_at: Utc::now(),
            workers,
        }
    }

    pub fn empty() -> Self {
        Self::new(0, Vec::new())
    }

    /// Load workers from a JSON file (either a bare array or a snapshot object)
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Input {
            Snapshot(RegistrySnapshot),
            Workers(Vec<Worker>),
        }

        let snapshot = match serde_json::from_str::<Input>(contents)? {
            Input::Snapshot(snapshot) => snapshot,
            Input::Workers(workers) => Self::new(1, workers),
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Reject duplicate ids so rank tie-breaking stays total
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for worker in &self.workers {
            if !seen.insert(worker.id.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate worker id '{}' in registry snapshot",
                    worker.id
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Worker> {
        self.workers.iter().find(|w| w.id == id)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

/// Source of registry snapshots consumed by the engine
pub trait SnapshotSource: Send + Sync {
    /// Current snapshot; two calls may observe different versions
    fn snapshot(&self) -> Arc<RegistrySnapshot>;
}

impl SnapshotSource for Arc<RegistrySnapshot> {
    fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(self)
    }
}

/// Shared registry whose snapshot pointer is swapped atomically on refresh
#[derive(Debug, Clone)]
pub struct SharedRegistry {
    tx: Arc<watch::Sender<Arc<RegistrySnapshot>>>,
}

impl Default for SharedRegistry {
    fn default() -> Self {
        Self::new(RegistrySnapshot::empty())
    }
}

impl SharedRegistry {
    pub fn new(initial: RegistrySnapshot) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx: Arc::new(tx) }
    }

    /// Publish a new worker list as the next snapshot version
    pub fn publish(&self, workers: Vec<Worker>) -> Result<u64> {
        let next = RegistrySnapshot::new(self.version() + 1, workers);
        self.replace(next)
    }

    /// Replace the current snapshot wholesale
    pub fn replace(&self, snapshot: RegistrySnapshot) -> Result<u64> {
        snapshot.validate()?;
        let version = snapshot.version;
        let count = snapshot.len();
        self.tx.send_replace(Arc::new(snapshot));
        info!(version, workers = count, "Published registry snapshot");
        Ok(version)
    }

    pub fn version(&self) -> u64 {
        self.tx.borrow().version
    }

    /// Watch for snapshot swaps
    pub fn subscribe(&self) -> watch::Receiver<Arc<RegistrySnapshot>> {
        self.tx.subscribe()
    }
}

impl SnapshotSource for SharedRegistry {
    fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.tx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_swaps_snapshot_without_touching_held_one() {
        let registry = SharedRegistry::new(RegistrySnapshot::new(
            1,
            vec![Worker::new("a/one", "a")],
        ));
        let held = registry.snapshot();

        let version = registry
            .publish(vec![Worker::new("a/one", "a"), Worker::new("b/two", "b")])
            .unwrap();

        assert_eq!(version, 2);
        assert_eq!(held.version, 1);
        assert_eq!(held.len(), 1);
        assert_eq!(registry.snapshot().len(), 2);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let registry = SharedRegistry::default();
        let result = registry.publish(vec![Worker::new("x", "p"), Worker::new("x", "p")]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(registry.version(), 0);
    }

    #[test]
    fn test_from_json_accepts_bare_worker_array() {
        let json = serde_json::to_string(&vec![Worker::new("p/m", "p")]).unwrap();
        let snapshot = RegistrySnapshot::from_json_str(&json).unwrap();
        assert_eq!(snapshot.version, 1);
        assert!(snapshot.get("p/m").is_some());
    }

    #[tokio::test]
    async fn test_subscribers_observe_refresh() {
        let registry = SharedRegistry::default();
        let mut rx = registry.subscribe();

        registry.publish(vec![Worker::new("p/m", "p")]).unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().version, 1);
    }
}
