//! Rank stage

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::profiles::DimensionWeights;
use crate::selection::types::{Dimension, DimensionScores};

/// A worker with its full dimension breakdown, ready to rank
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredWorker {
    pub worker_id: String,
    pub scores: DimensionScores,
    /// Estimated price of the request on this worker, in USD
    pub estimated_cost: f64,
}

/// A ranked worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub worker_id: String,
    pub scores: DimensionScores,
    pub estimated_cost: f64,
    /// Weighted sum of the dimension scores
    pub raw_composite: f64,
    /// Learning adjustment after clamping
    pub adjustment: f64,
    /// Score the ranking is ordered by
    pub composite: f64,
}

impl RankedCandidate {
    /// Per-dimension weighted contributions, largest first
    pub fn contributions(&self, weights: &DimensionWeights) -> Vec<(Dimension, f64)> {
        let mut contributions: Vec<(Dimension, f64)> = Dimension::ALL
            .iter()
            .map(|d| (*d, self.scores.get(*d) * weights.get(*d)))
            .collect();
        contributions.sort_by(|a, b| b.1.total_cmp(&a.1));
        contributions
    }
}

/// Weighted sum of the eight dimension scores, in fixed dimension order
pub fn composite_score(scores: &DimensionScores, weights: &DimensionWeights) -> f64 {
    Dimension::ALL
        .iter()
        .map(|d| scores.get(*d) * weights.get(*d))
        .sum()
}

/// Orders scored workers by adjusted composite score
#[derive(Debug, Clone, Copy)]
pub struct RankStage {
    max_adjustment: f64,
}

impl Default for RankStage {
    fn default() -> Self {
        Self::new(2.0)
    }
}

impl RankStage {
    /// A non-finite bound disables adjustments
    pub fn new(max_adjustment: f64) -> Self {
        let max_adjustment = if max_adjustment.is_finite() {
            max_adjustment.abs()
        } else {
            0.0
        };
        Self { max_adjustment }
    }

    /// Clamp an external adjustment; non-finite deltas are ignored
    pub fn clamp_adjustment(&self, delta: f64) -> f64 {
        if delta.is_finite() {
            delta.clamp(-self.max_adjustment, self.max_adjustment)
        } else {
            0.0
        }
    }

    pub fn rank(
        &self,
        scored: Vec<ScoredWorker>,
        weights: &DimensionWeights,
        adjustments: &HashMap<String, f64>,
    ) -> Vec<RankedCandidate> {
        let mut ranked: Vec<RankedCandidate> = scored
            .into_iter()
            .map(|worker| {
                let raw_composite = composite_score(&worker.scores, weights);
                let adjustment = adjustments
                    .get(&worker.worker_id)
                    .map(|delta| self.clamp_adjustment(*delta))
                    .unwrap_or(0.0);
                RankedCandidate {
                    composite: raw_composite + adjustment,
                    worker_id: worker.worker_id,
                    scores: worker.scores,
                    estimated_cost: worker.estimated_cost,
                    raw_composite,
                    adjustment,
                }
            })
            .collect();

        ranked.sort_by(rank_order);
        ranked
    }
}

/// Adjusted composite desc, quality desc, price asc, id asc
fn rank_order(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    b.composite
        .total_cmp(&a.composite)
        .then_with(|| b.scores.quality.total_cmp(&a.scores.quality))
        .then_with(|| a.estimated_cost.total_cmp(&b.estimated_cost))
        .then_with(|| a.worker_id.cmp(&b.worker_id))
}
