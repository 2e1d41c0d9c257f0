//! Learning-signal collaborator
//!
//! The learning dimension and the bounded rank adjustment both come from an
//! external model this crate never trains. The engine consumes it through
//! [`LearningSignal`]; scores are prefetched once per request before the
//! scorer fan-out, so scorers stay synchronous and pure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;

/// Opaque per-worker learning signal
#[async_trait]
pub trait LearningSignal: Send + Sync {
    /// Historical success score (0-100) for this worker on similar requests
    async fn learning_score(&self, worker_id: &str, context_hash: &str) -> Option<f64>;

    /// Additive composite adjustment; clamped by the rank stage
    async fn adjustment(&self, worker_id: &str, context_hash: &str) -> Option<f64>;
}

/// No learning data: neutral learning score, no adjustment
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLearning;

#[async_trait]
impl LearningSignal for NoLearning {
    async fn learning_score(&self, _worker_id: &str, _context_hash: &str) -> Option<f64> {
        None
    }

    async fn adjustment(&self, _worker_id: &str, _context_hash: &str) -> Option<f64> {
        None
    }
}

/// Learning values for one worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningEntry {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub adjustment: Option<f64>,
}

/// In-memory table of learning values
///
/// Context-specific entries (`worker_id` + `context_hash`) take precedence
/// over worker-wide entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticLearningSignal {
    #[serde(default)]
    workers: HashMap<String, LearningEntry>,
    #[serde(default)]
    contexts: HashMap<String, HashMap<String, LearningEntry>>,
}

impl StaticLearningSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a table from JSON
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Set the worker-wide entry
    pub fn with_worker(mut self, worker_id: impl Into<String>, entry: LearningEntry) -> Self {
        self.workers.insert(worker_id.into(), entry);
        self
    }

    /// Set an entry for one request context
    pub fn with_context(
        mut self,
        worker_id: impl Into<String>,
        context_hash: impl Into<String>,
        entry: LearningEntry,
    ) -> Self {
        self.contexts
            .entry(worker_id.into())
            .or_default()
            .insert(context_hash.into(), entry);
        self
    }

    fn entry(&self, worker_id: &str, context_hash: &str) -> Option<&LearningEntry> {
        self.contexts
            .get(worker_id)
            .and_then(|by_context| by_context.get(context_hash))
            .or_else(|| self.workers.get(worker_id))
    }
}

#[async_trait]
impl LearningSignal for StaticLearningSignal {
    async fn learning_score(&self, worker_id: &str, context_hash: &str) -> Option<f64> {
        self.entry(worker_id, context_hash).and_then(|e| e.score)
    }

    async fn adjustment(&self, worker_id: &str, context_hash: &str) -> Option<f64> {
        self.entry(worker_id, context_hash).and_then(|e| e.adjustment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_learning_is_empty() {
        let signal = NoLearning;
        assert_eq!(signal.learning_score("w", "h").await, None);
        assert_eq!(signal.adjustment("w", "h").await, None);
    }

    #[tokio::test]
    async fn test_context_entry_overrides_worker_entry() {
        let signal = StaticLearningSignal::new()
            .with_worker(
                "w",
                LearningEntry {
                    score: Some(40.0),
                    adjustment: Some(1.0),
                },
            )
            .with_context(
                "w",
                "ctx",
                LearningEntry {
                    score: Some(90.0),
                    adjustment: None,
                },
            );

        assert_eq!(signal.learning_score("w", "ctx").await, Some(90.0));
        assert_eq!(signal.adjustment("w", "ctx").await, None);
        assert_eq!(signal.learning_score("w", "other").await, Some(40.0));
        assert_eq!(signal.learning_score("unknown", "ctx").await, None);
    }

    #[test]
    fn test_deserialize_table() {
        let json = r#"{"workers": {"a/b": {"score": 72.5}}}"#;
        let signal: StaticLearningSignal = serde_json::from_str(json).unwrap();
        assert_eq!(signal.entry("a/b", "x").unwrap().score, Some(72.5));
    }
}
