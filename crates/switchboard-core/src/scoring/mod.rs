//! Dimension scoring
//!
//! Each of the eight dimensions is a [`Scorer`] registered in a fixed
//! [`ScorerTable`]. Scorers are synchronous, side-effect free and read only
//! the worker and the shared [`ScoringContext`], so the engine can run them
//! concurrently for every candidate.

mod dimensions;

use std::collections::{BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

pub use dimensions::{
    AvailabilityScorer, CapabilityScorer, ComplianceScorer, CostScorer, LatencyScorer,
    LearningScorer, QualityScorer, ReliabilityScorer,
};

use crate::config::ScoringConfig;
use crate::registry::{Certification, Worker};
use crate::selection::types::{Dimension, DimensionScores, RequestContext};

/// Per-call scorer failure; never surfaced to the caller
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScorerError {
    #[error("invalid {field} value {value} for worker '{worker}'")]
    InvalidInput {
        worker: String,
        field: &'static str,
        value: f64,
    },

    #[error("scorer produced non-finite score for worker '{0}'")]
    NonFinite(String),

    #[error("scorer panicked for worker '{0}'")]
    Panicked(String),

    #[error("scorer call cancelled")]
    Cancelled,
}

/// Estimated request cost range across the eligible candidate set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostRange {
    pub min: f64,
    pub max: f64,
}

impl CostRange {
    /// Range over every finite estimate; `None` if there is none
    pub fn from_costs(costs: impl IntoIterator<Item = f64>) -> Option<Self> {
        costs
            .into_iter()
            .filter(|c| c.is_finite())
            .fold(None, |range, cost| match range {
                None => Some(Self { min: cost, max: cost }),
                Some(Self { min, max }) => Some(Self {
                    min: min.min(cost),
                    max: max.max(cost),
                }),
            })
    }
}

/// Everything a scorer may read besides the worker itself
#[derive(Debug, Clone)]
pub struct ScoringContext {
    pub request: RequestContext,
    /// Explicit plus profile-mandated certifications
    pub required_certifications: BTreeSet<Certification>,
    /// Price range over the full eligible set
    pub cost_range: Option<CostRange>,
    /// Prefetched learning scores by worker id
    pub learning_scores: HashMap<String, f64>,
    pub config: ScoringConfig,
}

impl ScoringContext {
    pub fn new(request: RequestContext, config: ScoringConfig) -> Self {
        let required_certifications = request.required_certifications.clone();
        Self {
            request,
            required_certifications,
            cost_range: None,
            learning_scores: HashMap::new(),
            config,
        }
    }

    pub fn with_required_certifications(
        mut self,
        certifications: impl IntoIterator<Item = Certification>,
    ) -> Self {
        self.required_certifications.extend(certifications);
        self
    }

    /// Compute the cost range over a candidate set
    pub fn with_cost_range_of<'a>(mut self, workers: impl IntoIterator<Item = &'a Worker>) -> Self {
        let (input, output) = (
            self.request.estimated_input_tokens,
            self.request.estimated_output_tokens,
        );
        self.cost_range =
            CostRange::from_costs(workers.into_iter().map(|w| w.estimate_cost(input, output)));
        self
    }

    pub fn with_learning_scores(mut self, scores: HashMap<String, f64>) -> Self {
        self.learning_scores = scores;
        self
    }

    /// Estimated cost of serving this request on a worker
    pub fn estimated_cost(&self, worker: &Worker) -> f64 {
        worker.estimate_cost(
            self.request.estimated_input_tokens,
            self.request.estimated_output_tokens,
        )
    }
}

/// One scoring dimension
pub trait Scorer: Send + Sync {
    fn dimension(&self) -> Dimension;

    /// Score in [0, 100]
    fn score(&self, worker: &Worker, ctx: &ScoringContext) -> Result<f64, ScorerError>;
}

/// Validate and clamp a raw scorer output
pub fn run_scorer(
    scorer: &dyn Scorer,
    worker: &Worker,
    ctx: &ScoringContext,
) -> Result<f64, ScorerError> {
    let value = scorer.score(worker, ctx)?;
    if !value.is_finite() {
        return Err(ScorerError::NonFinite(worker.id.clone()));
    }
    Ok(value.clamp(0.0, 100.0))
}

/// [`run_scorer`] with panics turned into [`ScorerError::Panicked`]
pub fn run_scorer_isolated(
    scorer: &dyn Scorer,
    worker: &Worker,
    ctx: &ScoringContext,
) -> Result<f64, ScorerError> {
    panic::catch_unwind(AssertUnwindSafe(|| run_scorer(scorer, worker, ctx)))
        .unwrap_or_else(|_| Err(ScorerError::Panicked(worker.id.clone())))
}

/// Scores for one worker with the failures that were substituted
#[derive(Debug, Clone, Default)]
pub struct WorkerScoring {
    pub scores: DimensionScores,
    pub failures: Vec<(Dimension, ScorerError)>,
}

impl WorkerScoring {
    /// Every dimension failed; the worker cannot be ranked
    pub fn all_failed(&self) -> bool {
        self.failures.len() == Dimension::ALL.len()
    }
}

/// Fixed table with exactly one scorer per dimension
#[derive(Clone)]
pub struct ScorerTable {
    scorers: [Arc<dyn Scorer>; 8],
}

impl std::fmt::Debug for ScorerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.scorers.iter().map(|s| s.dimension()))
            .finish()
    }
}

impl Default for ScorerTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl ScorerTable {
    /// The built-in scorer for every dimension
    pub fn standard() -> Self {
        Self {
            scorers: [
                Arc::new(QualityScorer),
                Arc::new(CostScorer),
                Arc::new(LatencyScorer),
                Arc::new(CapabilityScorer),
                Arc::new(ReliabilityScorer),
                Arc::new(ComplianceScorer),
                Arc::new(AvailabilityScorer),
                Arc::new(LearningScorer),
            ],
        }
    }

    /// Replace the scorer registered for the scorer's dimension
    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        let slot = Self::slot(scorer.dimension());
        self.scorers[slot] = scorer;
        self
    }

    fn slot(dimension: Dimension) -> usize {
        Dimension::ALL
            .iter()
            .position(|d| *d == dimension)
            .unwrap_or_default()
    }

    pub fn get(&self, dimension: Dimension) -> Arc<dyn Scorer> {
        Arc::clone(&self.scorers[Self::slot(dimension)])
    }

    /// Scorers in dimension order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Scorer>> {
        self.scorers.iter()
    }

    /// Score one worker on every dimension, substituting failures
    pub fn score_worker(&self, worker: &Worker, ctx: &ScoringContext) -> WorkerScoring {
        let mut outcome = WorkerScoring::default();
        for scorer in &self.scorers {
            let dimension = scorer.dimension();
            match run_scorer_isolated(scorer.as_ref(), worker, ctx) {
                Ok(value) => outcome.scores.set(dimension, value),
                Err(err) => {
                    outcome
                        .scores
                        .set(dimension, ctx.config.failed_dimension_score);
                    outcome.failures.push((dimension, err));
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Capability;

    struct BrokenQuality;

    impl Scorer for BrokenQuality {
        fn dimension(&self) -> Dimension {
            Dimension::Quality
        }

        fn score(&self, _worker: &Worker, _ctx: &ScoringContext) -> Result<f64, ScorerError> {
            Ok(f64::NAN)
        }
    }

    struct PanickingLatency;

    impl Scorer for PanickingLatency {
        fn dimension(&self) -> Dimension {
            Dimension::Latency
        }

        fn score(&self, _worker: &Worker, _ctx: &ScoringContext) -> Result<f64, ScorerError> {
            panic!("latency table missing")
        }
    }

    fn context() -> ScoringContext {
        ScoringContext::new(
            RequestContext::new().with_capabilities([Capability::Streaming]),
            ScoringConfig::default(),
        )
    }

    #[test]
    fn test_table_has_one_scorer_per_dimension() {
        let table = ScorerTable::standard();
        for dimension in Dimension::ALL {
            assert_eq!(table.get(dimension).dimension(), dimension);
        }
    }

    #[test]
    fn test_score_worker_in_range() {
        let worker = Worker::new("p/m", "p").with_capabilities([Capability::Streaming]);
        let ctx = context().with_cost_range_of([&worker]);

        let outcome = ScorerTable::standard().score_worker(&worker, &ctx);

        assert!(outcome.failures.is_empty());
        for (_, value) in outcome.scores.iter() {
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn test_failed_scorer_substitutes_failure_score() {
        let worker = Worker::new("p/m", "p").with_quality(90.0);
        let table = ScorerTable::standard().with_scorer(Arc::new(BrokenQuality));

        let outcome = table.score_worker(&worker, &context());

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, Dimension::Quality);
        assert_eq!(outcome.scores.quality, 0.0);
        assert!(!outcome.all_failed());
    }

    #[test]
    fn test_panicking_scorer_is_isolated() {
        let worker = Worker::new("p/m", "p");
        let table = ScorerTable::standard().with_scorer(Arc::new(PanickingLatency));

        let outcome = table.score_worker(&worker, &context());

        assert_eq!(
            outcome.failures,
            vec![(Dimension::Latency, ScorerError::Panicked("p/m".to_string()))]
        );
    }

    #[test]
    fn test_cost_range_ignores_non_finite() {
        let range = CostRange::from_costs([2.0, f64::NAN, 0.5, 4.0]).unwrap();
        assert_eq!(range, CostRange { min: 0.5, max: 4.0 });
        assert!(CostRange::from_costs([f64::INFINITY]).is_none());
    }
}
