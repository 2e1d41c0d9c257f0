//! Per-request selection trace
//!
//! Every call to the engine produces one [`SelectionTrace`], success or not,
//! and hands it to a [`TraceSink`]. The core never persists traces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::selection::filter::EliminationBreakdown;
use crate::selection::rank::RankedCandidate;
use crate::selection::types::{ResolutionSource, SelectionState};

/// Wall time spent in each pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StageTimings {
    pub resolve: Duration,
    pub filter: Duration,
    pub score: Duration,
    pub rank: Duration,
    pub select: Duration,
    pub total: Duration,
}

/// Structured record of one selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionTrace {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub registry_version: u64,
    /// Resolved profile id; absent if resolution failed
    pub profile_id: Option<String>,
    pub resolution: Option<ResolutionSource>,
    pub final_state: SelectionState,
    pub eliminations: EliminationBreakdown,
    /// Highest-ranked candidates with their dimension breakdown
    pub top_candidates: Vec<RankedCandidate>,
    pub primary: Option<String>,
    pub partial_scoring: bool,
    pub timed_out_workers: Vec<String>,
    pub failed_workers: Vec<String>,
    pub scorer_failures: usize,
    pub learning_timeouts: usize,
    pub timings: StageTimings,
}

impl SelectionTrace {
    pub fn new(registry_version: u64) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            registry_version,
            profile_id: None,
            resolution: None,
            final_state: SelectionState::Received,
            eliminations: EliminationBreakdown::default(),
            top_candidates: Vec::new(),
            primary: None,
            partial_scoring: false,
            timed_out_workers: Vec::new(),
            failed_workers: Vec::new(),
            scorer_failures: 0,
            learning_timeouts: 0,
            timings: StageTimings::default(),
        }
    }
}

/// Receiver for selection traces
pub trait TraceSink: Send + Sync {
    fn record(&self, trace: &SelectionTrace);
}

/// Emits a summary line per selection through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn record(&self, trace: &SelectionTrace) {
        info!(
            request_id = %trace.request_id,
            state = %trace.final_state,
            profile = trace.profile_id.as_deref().unwrap_or("-"),
            primary = trace.primary.as_deref().unwrap_or("-"),
            eliminations = %trace.eliminations,
            partial = trace.partial_scoring,
            timed_out = trace.timed_out_workers.len(),
            failed = trace.failed_workers.len(),
            scorer_failures = trace.scorer_failures,
            learning_timeouts = trace.learning_timeouts,
            total_us = trace.timings.total.as_micros() as u64,
            "selection finished"
        );
    }
}

/// Keeps every trace in memory
#[derive(Debug, Default)]
pub struct MemoryTraceSink {
    traces: Mutex<Vec<SelectionTrace>>,
}

impl MemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn traces(&self) -> Vec<SelectionTrace> {
        self.traces
            .lock()
            .map(|traces| traces.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<SelectionTrace> {
        self.traces
            .lock()
            .ok()
            .and_then(|traces| traces.last().cloned())
    }

    pub fn len(&self) -> usize {
        self.traces.lock().map(|traces| traces.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TraceSink for MemoryTraceSink {
    fn record(&self, trace: &SelectionTrace) {
        if let Ok(mut traces) = self.traces.lock() {
            traces.push(trace.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemoryTraceSink::new();
        assert!(sink.is_empty());

        let mut trace = SelectionTrace::new(3);
        trace.primary = Some("w".to_string());
        sink.record(&trace);
        sink.record(&SelectionTrace::new(4));

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.traces()[0].primary.as_deref(), Some("w"));
        assert_eq!(sink.last().unwrap().registry_version, 4);
    }

    #[test]
    fn test_trace_serializes() {
        let trace = SelectionTrace::new(1);
        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(json["final_state"], "received");
        assert!(json["eliminations"]["eliminated"].is_object());
    }
}
