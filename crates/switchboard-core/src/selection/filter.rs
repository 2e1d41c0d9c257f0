//! Filter stage
//!
//! Removes ineligible workers before any scoring happens. Predicates run in
//! a fixed cheap-to-expensive order and short-circuit per worker, so each
//! eliminated worker is attributed to exactly one predicate.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::profiles::WeightProfile;
use crate::registry::{CapabilitySet, Certification, SubscriptionTier, Worker, WorkerClass};
use crate::selection::types::RequestContext;

/// One eligibility check, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterPredicate {
    /// The registry snapshot had no workers at all
    Registry,
    Status,
    Capability,
    SubscriptionTier,
    Certification,
    WorkerClass,
    QualityFloor,
    PriceCeiling,
    LatencyCeiling,
    Readiness,
    /// Every survivor was dropped during scoring (failed or timed out)
    Scoring,
}

impl FilterPredicate {
    /// Worker predicates in evaluation order
    pub const ORDER: [FilterPredicate; 9] = [
        Self::Status,
        Self::Capability,
        Self::SubscriptionTier,
        Self::Certification,
        Self::WorkerClass,
        Self::QualityFloor,
        Self::PriceCeiling,
        Self::LatencyCeiling,
        Self::Readiness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registry => "registry",
            Self::Status => "status",
            Self::Capability => "capability",
            Self::SubscriptionTier => "subscription_tier",
            Self::Certification => "certification",
            Self::WorkerClass => "worker_class",
            Self::QualityFloor => "quality_floor",
            Self::PriceCeiling => "price_ceiling",
            Self::LatencyCeiling => "latency_ceiling",
            Self::Readiness => "readiness",
            Self::Scoring => "scoring",
        }
    }

    /// What a caller can change to get past this predicate
    pub fn relaxation_hint(&self) -> &'static str {
        match self {
            Self::Registry => "Wait for the worker registry to be populated",
            Self::Status => "All matching workers are disabled; retry after the next registry refresh",
            Self::Capability => "Drop one of the required capabilities",
            Self::SubscriptionTier => "Upgrade the subscription tier",
            Self::Certification => "Remove a required certification or pick a different profile",
            Self::WorkerClass => "Pick a profile that does not force a worker class",
            Self::QualityFloor => "Lower the minimum quality or pick a profile with a lower quality floor",
            Self::PriceCeiling => "Raise the maximum price",
            Self::LatencyCeiling => "Raise the maximum latency",
            Self::Readiness => "All matching workers are unavailable; retry later",
            Self::Scoring => "Scoring failed for every eligible worker; retry the request",
        }
    }
}

impl std::fmt::Display for FilterPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of workers removed by each predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EliminationBreakdown {
    pub total: usize,
    pub eliminated: BTreeMap<FilterPredicate, usize>,
}

impl Default for EliminationBreakdown {
    fn default() -> Self {
        Self {
            total: 0,
            eliminated: FilterPredicate::ORDER.iter().map(|p| (*p, 0)).collect(),
        }
    }
}

impl EliminationBreakdown {
    pub fn count(&self, predicate: FilterPredicate) -> usize {
        self.eliminated.get(&predicate).copied().unwrap_or(0)
    }

    pub fn total_eliminated(&self) -> usize {
        self.eliminated.values().sum()
    }

    /// First predicate after which no worker remained
    pub fn exhausting_predicate(&self) -> Option<FilterPredicate> {
        if self.total == 0 {
            return Some(FilterPredicate::Registry);
        }
        let mut remaining = self.total;
        for predicate in FilterPredicate::ORDER {
            remaining = remaining.saturating_sub(self.count(predicate));
            if remaining == 0 {
                return Some(predicate);
            }
        }
        None
    }
}

impl std::fmt::Display for EliminationBreakdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} candidates", self.total)?;
        for (predicate, count) in self.eliminated.iter().filter(|(_, c)| **c > 0) {
            write!(f, ", {}={}", predicate, count)?;
        }
        Ok(())
    }
}

/// Hard constraints merged from the request and the resolved profile
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConstraints {
    pub capabilities: CapabilitySet,
    pub certifications: BTreeSet<Certification>,
    pub tier: SubscriptionTier,
    pub forced_class: Option<WorkerClass>,
    pub min_quality: Option<f64>,
    pub max_cost_usd: Option<f64>,
    pub max_latency_ms: Option<u64>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl FilterConstraints {
    /// Merge request ceilings with profile constraints; the stricter wins
    pub fn resolve(request: &RequestContext, profile: &WeightProfile) -> Self {
        let certifications = request
            .required_certifications
            .union(&profile.required_certifications)
            .copied()
            .collect();
        let min_quality = match (request.min_quality, profile.min_quality) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        Self {
            capabilities: request.required_capabilities,
            certifications,
            tier: request.tier,
            forced_class: profile.forced_class,
            min_quality,
            max_cost_usd: request.max_cost_usd,
            max_latency_ms: request.max_latency_ms,
            input_tokens: request.estimated_input_tokens,
            output_tokens: request.estimated_output_tokens,
        }
    }

    /// First predicate this worker fails, if any
    pub fn first_failure(&self, worker: &Worker) -> Option<FilterPredicate> {
        if !worker.is_active() {
            return Some(FilterPredicate::Status);
        }
        if !worker.capabilities.is_superset(&self.capabilities) {
            return Some(FilterPredicate::Capability);
        }
        if self.tier < worker.min_tier {
            return Some(FilterPredicate::SubscriptionTier);
        }
        if !self.certifications.is_subset(&worker.certifications) {
            return Some(FilterPredicate::Certification);
        }
        if self.forced_class.is_some_and(|class| class != worker.class) {
            return Some(FilterPredicate::WorkerClass);
        }
        // Negated comparisons also reject NaN attributes
        if self
            .min_quality
            .is_some_and(|floor| !(worker.quality_score >= floor))
        {
            return Some(FilterPredicate::QualityFloor);
        }
        if let Some(ceiling) = self.max_cost_usd {
            let cost = worker.estimate_cost(self.input_tokens, self.output_tokens);
            if !(cost <= ceiling) {
                return Some(FilterPredicate::PriceCeiling);
            }
        }
        if self
            .max_latency_ms
            .is_some_and(|ceiling| worker.latency_ms > ceiling)
        {
            return Some(FilterPredicate::LatencyCeiling);
        }
        if !worker.readiness.is_serving() {
            return Some(FilterPredicate::Readiness);
        }
        None
    }
}

/// Result of the filter stage
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    /// Indices of eligible workers, in registry order
    pub eligible: Vec<usize>,
    pub breakdown: EliminationBreakdown,
}

impl FilterOutcome {
    pub fn is_empty(&self) -> bool {
        self.eligible.is_empty()
    }

    /// Predicate to report when nothing survived
    pub fn reason(&self) -> Option<FilterPredicate> {
        if self.eligible.is_empty() {
            self.breakdown.exhausting_predicate()
        } else {
            None
        }
    }

    pub fn workers<'a>(&'a self, all: &'a [Worker]) -> impl Iterator<Item = &'a Worker> + 'a {
        self.eligible.iter().filter_map(move |&i| all.get(i))
    }
}

/// Stateless eligibility filter
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterStage;

impl FilterStage {
    pub fn apply(&self, workers: &[Worker], constraints: &FilterConstraints) -> FilterOutcome {
        let mut breakdown = EliminationBreakdown {
            total: workers.len(),
            ..Default::default()
        };
        let mut eligible = Vec::with_capacity(workers.len());

        for (index, worker) in workers.iter().enumerate() {
            match constraints.first_failure(worker) {
                Some(predicate) => *breakdown.eliminated.entry(predicate).or_default() += 1,
                None => eligible.push(index),
            }
        }

        FilterOutcome {
            eligible,
            breakdown,
        }
    }
}
