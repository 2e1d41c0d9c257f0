//! The eight built-in dimension scorers

use super::{Scorer, ScorerError, ScoringContext};
use crate::registry::{ReadinessTier, Worker};
use crate::selection::types::Dimension;

/// Benchmarks matching a requested capability count double
const RELEVANT_BENCHMARK_WEIGHT: f64 = 2.0;
/// Reliability mix of uptime and inverse error rate
const UPTIME_SHARE: f64 = 0.6;

fn finite(worker: &Worker, field: &'static str, value: f64) -> Result<f64, ScorerError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ScorerError::InvalidInput {
            worker: worker.id.clone(),
            field,
            value,
        })
    }
}

/// Benchmark quality, weighted towards the requested capabilities
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityScorer;

impl Scorer for QualityScorer {
    fn dimension(&self) -> Dimension {
        Dimension::Quality
    }

    fn score(&self, worker: &Worker, ctx: &ScoringContext) -> Result<f64, ScorerError> {
        let overall = finite(worker, "quality_score", worker.quality_score)?;

        let mut weighted_sum = overall;
        let mut total_weight = 1.0;
        for capability in ctx.request.required_capabilities.iter() {
            if let Some(&benchmark) = worker.benchmarks.get(capability.as_str()) {
                weighted_sum += finite(worker, "benchmark", benchmark)? * RELEVANT_BENCHMARK_WEIGHT;
                total_weight += RELEVANT_BENCHMARK_WEIGHT;
            }
        }
        Ok(weighted_sum / total_weight)
    }
}

/// Inverted price, normalized over the eligible set's price range
#[derive(Debug, Clone, Copy, Default)]
pub struct CostScorer;

impl Scorer for CostScorer {
    fn dimension(&self) -> Dimension {
        Dimension::Cost
    }

    fn score(&self, worker: &Worker, ctx: &ScoringContext) -> Result<f64, ScorerError> {
        let cost = finite(worker, "estimated_cost", ctx.estimated_cost(worker))?;
        if cost < 0.0 {
            return Err(ScorerError::InvalidInput {
                worker: worker.id.clone(),
                field: "estimated_cost",
                value: cost,
            });
        }

        let Some(range) = ctx.cost_range else {
            return Ok(100.0);
        };
        let spread = range.max - range.min;
        if spread <= f64::EPSILON {
            return Ok(100.0);
        }
        Ok(100.0 * (range.max - cost) / spread)
    }
}

/// Expected time to first token mapped onto configured bands
#[derive(Debug, Clone, Copy, Default)]
pub struct LatencyScorer;

impl Scorer for LatencyScorer {
    fn dimension(&self) -> Dimension {
        Dimension::Latency
    }

    fn score(&self, worker: &Worker, ctx: &ScoringContext) -> Result<f64, ScorerError> {
        let score = ctx
            .config
            .latency_bands
            .iter()
            .find(|band| worker.latency_ms <= band.max_ms)
            .map(|band| band.score)
            .unwrap_or(ctx.config.latency_floor_score);
        Ok(score)
    }
}

/// Share of the requested capabilities the worker offers
#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilityScorer;

impl Scorer for CapabilityScorer {
    fn dimension(&self) -> Dimension {
        Dimension::Capability
    }

    fn score(&self, worker: &Worker, ctx: &ScoringContext) -> Result<f64, ScorerError> {
        let required = &ctx.request.required_capabilities;
        if required.is_empty() {
            return Ok(100.0);
        }
        let matched = worker.capabilities.intersection(required).len();
        Ok(100.0 * matched as f64 / required.len() as f64)
    }
}

/// Recent uptime combined with inverse error rate
#[derive(Debug, Clone, Copy, Default)]
pub struct ReliabilityScorer;

impl Scorer for ReliabilityScorer {
    fn dimension(&self) -> Dimension {
        Dimension::Reliability
    }

    fn score(&self, worker: &Worker, _ctx: &ScoringContext) -> Result<f64, ScorerError> {
        let uptime = finite(worker, "uptime_percent", worker.uptime_percent)?;
        let error_rate = finite(worker, "error_rate", worker.error_rate)?;

        if !(0.0..=100.0).contains(&uptime) {
            return Err(ScorerError::InvalidInput {
                worker: worker.id.clone(),
                field: "uptime_percent",
                value: uptime,
            });
        }
        if !(0.0..=1.0).contains(&error_rate) {
            return Err(ScorerError::InvalidInput {
                worker: worker.id.clone(),
                field: "error_rate",
                value: error_rate,
            });
        }

        Ok(UPTIME_SHARE * uptime + (1.0 - UPTIME_SHARE) * (1.0 - error_rate) * 100.0)
    }
}

/// Held required certifications, with a small bonus for extra ones
///
/// A worker holding every required certification starts at
/// `compliant_base` and climbs toward 100 with each extra certification.
/// A worker missing any of them stays at least one increment below that
/// base, so only full holders can reach 100.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplianceScorer;

impl Scorer for ComplianceScorer {
    fn dimension(&self) -> Dimension {
        Dimension::Compliance
    }

    fn score(&self, worker: &Worker, ctx: &ScoringContext) -> Result<f64, ScorerError> {
        let required = &ctx.required_certifications;
        let held = required
            .iter()
            .filter(|c| worker.certifications.contains(*c))
            .count();
        let extra = worker
            .certifications
            .iter()
            .filter(|c| !required.contains(*c))
            .count();
        let bonus = extra as f64 * ctx.config.extra_certification_bonus;

        if required.is_empty() {
            return Ok((ctx.config.compliance_baseline + bonus).min(100.0));
        }
        if held == required.len() {
            return Ok((ctx.config.compliant_base + bonus).min(100.0));
        }
        let ceiling = (ctx.config.compliant_base - ctx.config.compliance_increment).max(0.0);
        Ok((held as f64 * ctx.config.compliance_increment + bonus).min(ceiling))
    }
}

/// Readiness tier mapped onto a score band
#[derive(Debug, Clone, Copy, Default)]
pub struct AvailabilityScorer;

impl Scorer for AvailabilityScorer {
    fn dimension(&self) -> Dimension {
        Dimension::Availability
    }

    fn score(&self, worker: &Worker, _ctx: &ScoringContext) -> Result<f64, ScorerError> {
        Ok(match worker.readiness {
            ReadinessTier::Hot => 100.0,
            ReadinessTier::Warm => 85.0,
            ReadinessTier::Scaling => 60.0,
            ReadinessTier::Cold => 30.0,
            ReadinessTier::Unavailable => 0.0,
        })
    }
}

/// Externally computed historical success score
#[derive(Debug, Clone, Copy, Default)]
pub struct LearningScorer;

impl Scorer for LearningScorer {
    fn dimension(&self) -> Dimension {
        Dimension::Learning
    }

    fn score(&self, worker: &Worker, ctx: &ScoringContext) -> Result<f64, ScorerError> {
        match ctx.learning_scores.get(&worker.id) {
            Some(&score) => finite(worker, "learning_score", score),
            None => Ok(ctx.config.neutral_learning_score),
        }
    }
}
