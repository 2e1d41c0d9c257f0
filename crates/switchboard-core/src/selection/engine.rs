//! Selection engine
//!
//! Drives one request through `received -> filtered -> scored -> ranked ->
//! selected`, or `received -> filtered -> no_candidates` when nothing is
//! eligible. Each selection reads a single registry snapshot and shares no
//! mutable state with other selections.
//!
//! Learning signals are fetched concurrently under their own timeout, which
//! never extends past the latency budget. Scoring fans out one task per
//! (worker, dimension) on a [`JoinSet`], bounded by a [`Semaphore`] and tied
//! to a per-request [`CancellationToken`]. At the deadline the token fires,
//! pending tasks are aborted and the engine moves on with what completed:
//! fully scored workers are ranked and the rest are reported as timed out.
//! If no worker finished, the capped subset pre-sorted by quality is ranked
//! on the dimensions it did finish. If the budget is already spent before
//! scoring starts, that capped subset is scored inline. Both degrade paths
//! flag the result as partial.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::classifier::{DomainClassifier, KeywordClassifier};
use crate::config::{Config, EngineConfig, ScoringConfig};
use crate::error::{Error, Result};
use crate::learning::{LearningSignal, NoLearning};
use crate::profiles::{ProfileCatalog, WeightProfileStore};
use crate::registry::{RegistrySnapshot, SnapshotSource, Worker};
use crate::scoring::{ScorerError, ScorerTable, ScoringContext, WorkerScoring, run_scorer_isolated};
use crate::selection::filter::{FilterConstraints, FilterPredicate, FilterStage};
use crate::selection::rank::{RankStage, ScoredWorker};
use crate::selection::resolve::WeightResolver;
use crate::selection::select::{SelectStage, SelectionFacts};
use crate::selection::trace::{LogTraceSink, SelectionTrace, TraceSink};
use crate::selection::types::{
    Dimension, RequestContext, SelectionMetadata, SelectionResult, SelectionState,
};

type ScorerOutcome = (Dimension, std::result::Result<f64, ScorerError>);

/// Slot, dimension, result and completion time of one scorer task
type Finished = (
    usize,
    Dimension,
    std::result::Result<f64, ScorerError>,
    tokio::time::Instant,
);

/// Learning data gathered before scoring
#[derive(Debug, Default)]
struct LearningPrefetch {
    scores: HashMap<String, f64>,
    adjustments: HashMap<String, f64>,
    /// Lookups abandoned at the learning deadline
    timed_out: usize,
}

/// Raw scorer results per worker slot
struct FanOut {
    outcomes: Vec<Vec<ScorerOutcome>>,
    timed_out: bool,
}

impl FanOut {
    /// Record one task; results stamped after the deadline count as cancelled
    fn record(&mut self, (slot, dimension, result, finished_at): Finished, deadline: tokio::time::Instant) {
        let result = if finished_at > deadline {
            self.timed_out = true;
            Err(ScorerError::Cancelled)
        } else {
            result
        };
        if let Some(outcome) = self.outcomes.get_mut(slot) {
            outcome.push((dimension, result));
        }
    }

    fn is_complete(outcome: &[ScorerOutcome]) -> bool {
        outcome.len() == Dimension::ALL.len()
            && outcome
                .iter()
                .all(|(_, result)| !matches!(result, Err(ScorerError::Cancelled)))
    }

    fn any_complete(&self) -> bool {
        self.outcomes.iter().any(|outcome| Self::is_complete(outcome))
    }
}

/// Outcome of the score stage
#[derive(Debug, Default)]
struct ScorePass {
    scored: Vec<ScoredWorker>,
    timed_out: Vec<String>,
    failed: Vec<String>,
    scorer_failures: usize,
    partial: bool,
}

/// Weighted multi-dimensional worker selection
pub struct SelectionEngine {
    registry: Arc<dyn SnapshotSource>,
    resolver: WeightResolver,
    learning: Arc<dyn LearningSignal>,
    scorers: ScorerTable,
    filter: FilterStage,
    rank: RankStage,
    select: SelectStage,
    config: EngineConfig,
    scoring: ScoringConfig,
    trace_sink: Arc<dyn TraceSink>,
}

impl std::fmt::Debug for SelectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionEngine")
            .field("resolver", &self.resolver)
            .field("scorers", &self.scorers)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SelectionEngine {
    pub fn builder() -> SelectionEngineBuilder {
        SelectionEngineBuilder::new()
    }

    /// Engine with built-in collaborators configured from `config`
    pub fn from_config(config: Config, registry: Arc<dyn SnapshotSource>) -> Result<Self> {
        Self::builder().config(config).registry(registry).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn profiles(&self) -> &Arc<dyn WeightProfileStore> {
        self.resolver.store()
    }

    /// Select a primary worker and fallback chain for one request
    pub async fn select(&self, request: &RequestContext) -> Result<SelectionResult> {
        let started = Instant::now();
        let snapshot = self.registry.snapshot();
        let mut trace = SelectionTrace::new(snapshot.version);
        debug!(
            request_id = %trace.request_id,
            state = %SelectionState::Received,
            registry_version = snapshot.version,
            workers = snapshot.len(),
            "selection received"
        );

        let mut outcome = self.run(request, &snapshot, started, &mut trace).await;

        let elapsed = started.elapsed();
        trace.timings.total = elapsed;
        match &mut outcome {
            Ok(result) => {
                result.elapsed = elapsed;
                trace.final_state = SelectionState::Selected;
            }
            Err(Error::NoEligibleWorker { .. }) => trace.final_state = SelectionState::NoCandidates,
            Err(_) => {}
        }
        self.trace_sink.record(&trace);
        outcome
    }

    async fn run(
        &self,
        request: &RequestContext,
        snapshot: &RegistrySnapshot,
        started: Instant,
        trace: &mut SelectionTrace,
    ) -> Result<SelectionResult> {
        let stage = Instant::now();
        let resolution = self.resolver.resolve(request)?;
        let profile = Arc::clone(&resolution.profile);
        trace.timings.resolve = stage.elapsed();
        trace.profile_id = Some(profile.id.clone());
        trace.resolution = Some(resolution.source.clone());

        let stage = Instant::now();
        let constraints = FilterConstraints::resolve(request, &profile);
        let filtered = self.filter.apply(&snapshot.workers, &constraints);
        trace.timings.filter = stage.elapsed();
        trace.eliminations = filtered.breakdown.clone();
        trace.final_state = SelectionState::Filtered;
        debug!(
            state = %SelectionState::Filtered,
            profile = %profile.id,
            eligible = filtered.eligible.len(),
            eliminations = %filtered.breakdown,
            "filter stage complete"
        );

        if filtered.is_empty() {
            let reason = filtered.reason().unwrap_or(FilterPredicate::Registry);
            return Err(Error::NoEligibleWorker {
                reason,
                breakdown: filtered.breakdown,
            });
        }

        let eligible: Vec<Arc<Worker>> = filtered
            .workers(&snapshot.workers)
            .cloned()
            .map(Arc::new)
            .collect();

        let stage = Instant::now();
        let deadline = tokio::time::Instant::from_std(started + self.config.latency_budget());
        let cancel = CancellationToken::new();
        // Anything still running when this request returns sees the cancellation
        let _cancel_on_return = cancel.clone().drop_guard();

        let within_budget = tokio::time::Instant::now() < deadline;
        let candidates = if within_budget {
            eligible.clone()
        } else {
            self.capped(&eligible)
        };

        let learning_deadline =
            deadline.min(tokio::time::Instant::now() + self.config.learning_timeout());
        let learning = self
            .prefetch_learning(&candidates, &request.context_hash(), learning_deadline, &cancel)
            .await;
        let ctx = Arc::new(
            ScoringContext::new(request.clone(), self.scoring.clone())
                .with_required_certifications(constraints.certifications.iter().copied())
                .with_cost_range_of(eligible.iter().map(|w| w.as_ref()))
                .with_learning_scores(learning.scores),
        );

        let pass = if within_budget && tokio::time::Instant::now() < deadline {
            let fan_out = self
                .score_concurrently(&candidates, &ctx, deadline, &cancel)
                .await;
            if fan_out.timed_out && !fan_out.any_complete() {
                warn!(
                    budget_ms = self.config.latency_budget_ms,
                    cap = self.config.partial_scoring_cap,
                    "no worker finished scoring within budget, ranking capped subset on completed dimensions"
                );
                self.salvage(&candidates, fan_out, &ctx)
            } else {
                self.collect(&candidates, fan_out, &ctx)
            }
        } else {
            let subset = self.capped(&candidates);
            warn!(
                budget_ms = self.config.latency_budget_ms,
                eligible = eligible.len(),
                scored = subset.len(),
                "latency budget spent before scoring, scoring capped subset"
            );
            self.score_inline(&subset, &ctx)
        };

        trace.timings.score = stage.elapsed();
        trace.final_state = SelectionState::Scored;
        trace.partial_scoring = pass.partial;
        trace.timed_out_workers = pass.timed_out.clone();
        trace.failed_workers = pass.failed.clone();
        trace.scorer_failures = pass.scorer_failures;
        trace.learning_timeouts = learning.timed_out;
        debug!(
            state = %SelectionState::Scored,
            scored = pass.scored.len(),
            timed_out = pass.timed_out.len(),
            failed = pass.failed.len(),
            partial = pass.partial,
            "score stage complete"
        );

        let stage = Instant::now();
        let candidates_scored = pass.scored.len();
        let ranked = self
            .rank
            .rank(pass.scored, &profile.weights, &learning.adjustments);
        trace.timings.rank = stage.elapsed();
        trace.final_state = SelectionState::Ranked;
        trace.top_candidates = ranked.iter().take(self.config.trace_top_n).cloned().collect();

        let stage = Instant::now();
        let facts = SelectionFacts {
            profile: &profile,
            resolution: &resolution.source,
            constraints: &constraints,
            eligible: filtered.eligible.len(),
            total: snapshot.len(),
            partial_scoring: pass.partial,
        };
        let Some(selection) = self.select.select(ranked, &facts) else {
            let mut breakdown = filtered.breakdown;
            breakdown.eliminated.insert(
                FilterPredicate::Scoring,
                pass.failed.len() + pass.timed_out.len(),
            );
            trace.eliminations = breakdown.clone();
            return Err(Error::NoEligibleWorker {
                reason: FilterPredicate::Scoring,
                breakdown,
            });
        };
        trace.timings.select = stage.elapsed();
        trace.primary = Some(selection.primary.worker_id.clone());
        debug!(
            state = %SelectionState::Selected,
            primary = %selection.primary.worker_id,
            composite = selection.primary.composite,
            fallbacks = selection.fallbacks.len(),
            "selection complete"
        );

        Ok(SelectionResult {
            primary: selection.primary.worker_id,
            composite_score: selection.primary.composite,
            raw_composite_score: selection.primary.raw_composite,
            scores: selection.primary.scores,
            profile: profile.as_ref().clone(),
            resolution: resolution.source,
            fallbacks: selection.fallbacks,
            justification: selection.justification,
            elapsed: started.elapsed(),
            metadata: SelectionMetadata {
                partial_scoring: pass.partial,
                candidates_total: snapshot.len(),
                candidates_eligible: filtered.eligible.len(),
                candidates_scored,
                timed_out_workers: pass.timed_out,
                failed_workers: pass.failed,
                scorer_failures: pass.scorer_failures,
                learning_timeouts: learning.timed_out,
                registry_version: snapshot.version,
                final_state: SelectionState::Selected,
            },
        })
    }

    /// Slots of the degrade subset: best raw quality first, capped
    fn capped_order(&self, workers: &[Arc<Worker>]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..workers.len()).collect();
        order.sort_by(|&a, &b| {
            workers[b]
                .quality_score
                .total_cmp(&workers[a].quality_score)
                .then_with(|| workers[a].id.cmp(&workers[b].id))
        });
        order.truncate(self.config.partial_scoring_cap.max(1));
        order
    }

    fn capped(&self, workers: &[Arc<Worker>]) -> Vec<Arc<Worker>> {
        self.capped_order(workers)
            .into_iter()
            .map(|slot| Arc::clone(&workers[slot]))
            .collect()
    }

    /// Fetch learning scores and adjustments for every candidate until `deadline`
    async fn prefetch_learning(
        &self,
        workers: &[Arc<Worker>],
        context_hash: &str,
        deadline: tokio::time::Instant,
        cancel: &CancellationToken,
    ) -> LearningPrefetch {
        let mut join_set = JoinSet::new();
        for worker in workers {
            let learning = Arc::clone(&self.learning);
            let worker_id = worker.id.clone();
            let context_hash = context_hash.to_string();
            let cancel = cancel.clone();

            join_set.spawn(async move {
                let fetched = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    fetched = async {
                        tokio::join!(
                            learning.learning_score(&worker_id, &context_hash),
                            learning.adjustment(&worker_id, &context_hash),
                        )
                    } => Some(fetched),
                };
                (worker_id, fetched)
            });
        }

        let mut prefetch = LearningPrefetch::default();
        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                joined = join_set.join_next() => match joined {
                    Some(Ok((worker_id, Some((score, adjustment))))) => {
                        if let Some(score) = score {
                            prefetch.scores.insert(worker_id.clone(), score);
                        }
                        if let Some(delta) = adjustment {
                            prefetch.adjustments.insert(worker_id, delta);
                        }
                    }
                    Some(Ok((_, None))) => prefetch.timed_out += 1,
                    Some(Err(err)) => warn!(error = %err, "learning lookup did not complete"),
                    None => break,
                },
                _ = &mut sleep => {
                    prefetch.timed_out += join_set.len();
                    join_set.abort_all();
                    break;
                }
            }
        }

        if prefetch.timed_out > 0 {
            warn!(
                timeout_ms = self.config.learning_timeout_ms,
                missed = prefetch.timed_out,
                "learning signal missed its deadline, using neutral learning scores"
            );
        }
        prefetch
    }

    /// Score every candidate on every dimension concurrently until `deadline`
    async fn score_concurrently(
        &self,
        workers: &[Arc<Worker>],
        ctx: &Arc<ScoringContext>,
        deadline: tokio::time::Instant,
        cancel: &CancellationToken,
    ) -> FanOut {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_scorers.max(1)));
        let mut join_set = JoinSet::new();

        for (slot, worker) in workers.iter().enumerate() {
            for scorer in self.scorers.iter() {
                let worker = Arc::clone(worker);
                let scorer = Arc::clone(scorer);
                let ctx = Arc::clone(ctx);
                let semaphore = Arc::clone(&semaphore);
                let cancel = cancel.clone();

                join_set.spawn(async move {
                    let dimension = scorer.dimension();
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Err(ScorerError::Cancelled),
                        permit = semaphore.acquire_owned() => match permit {
                            Ok(_permit) if !cancel.is_cancelled() => {
                                run_scorer_isolated(scorer.as_ref(), &worker, &ctx)
                            }
                            _ => Err(ScorerError::Cancelled),
                        },
                    };
                    (slot, dimension, result, tokio::time::Instant::now())
                });
            }
        }

        let mut fan_out = FanOut {
            outcomes: vec![Vec::with_capacity(Dimension::ALL.len()); workers.len()],
            timed_out: false,
        };
        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                joined = join_set.join_next() => match joined {
                    Some(Ok(finished)) => fan_out.record(finished, deadline),
                    Some(Err(err)) => warn!(error = %err, "scorer task did not complete"),
                    None => break,
                },
                _ = &mut sleep => {
                    fan_out.timed_out = true;
                    cancel.cancel();
                    join_set.abort_all();
                    break;
                }
            }
        }

        // Take what already finished; aborted tasks are not waited for
        while let Some(joined) = join_set.try_join_next() {
            if let Ok(finished) = joined {
                fan_out.record(finished, deadline);
            }
        }

        if fan_out.timed_out {
            warn!(
                budget_ms = self.config.latency_budget_ms,
                pending = join_set.len(),
                "latency budget exceeded during scoring"
            );
        }
        fan_out
    }

    /// Rank fully scored workers; the rest timed out
    fn collect(&self, workers: &[Arc<Worker>], fan_out: FanOut, ctx: &ScoringContext) -> ScorePass {
        let mut pass = ScorePass {
            partial: fan_out.timed_out,
            ..Default::default()
        };
        for (worker, outcome) in workers.iter().zip(fan_out.outcomes) {
            if !FanOut::is_complete(&outcome) {
                debug!(worker = %worker.id, "scoring did not finish before the deadline, dropping worker");
                pass.timed_out.push(worker.id.clone());
                continue;
            }
            absorb(worker, assemble(outcome, ctx), ctx, &mut pass);
        }
        pass
    }

    /// Rank the capped subset on whatever dimensions finished in time
    fn salvage(&self, workers: &[Arc<Worker>], fan_out: FanOut, ctx: &ScoringContext) -> ScorePass {
        let mut pass = ScorePass {
            partial: true,
            ..Default::default()
        };
        let capped = self.capped_order(workers);
        let mut outcomes: Vec<Option<Vec<ScorerOutcome>>> =
            fan_out.outcomes.into_iter().map(Some).collect();

        for &slot in &capped {
            let outcome = outcomes[slot].take().unwrap_or_default();
            absorb(&workers[slot], assemble(outcome, ctx), ctx, &mut pass);
        }
        for (worker, outcome) in workers.iter().zip(outcomes) {
            if outcome.is_some() {
                pass.timed_out.push(worker.id.clone());
            }
        }
        pass
    }

    /// Score a small candidate set on the calling task
    fn score_inline(&self, workers: &[Arc<Worker>], ctx: &ScoringContext) -> ScorePass {
        let mut pass = ScorePass {
            partial: true,
            ..Default::default()
        };
        for worker in workers {
            let scoring = self.scorers.score_worker(worker, ctx);
            absorb(worker, scoring, ctx, &mut pass);
        }
        pass
    }
}

/// Scores from raw scorer results; dimensions that never finished take the failure score
fn assemble(outcome: Vec<ScorerOutcome>, ctx: &ScoringContext) -> WorkerScoring {
    let mut scoring = WorkerScoring::default();
    for dimension in Dimension::ALL {
        scoring
            .scores
            .set(dimension, ctx.config.failed_dimension_score);
    }
    for (dimension, result) in outcome {
        match result {
            Ok(value) => scoring.scores.set(dimension, value),
            Err(ScorerError::Cancelled) => {}
            Err(err) => scoring.failures.push((dimension, err)),
        }
    }
    scoring
}

/// Fold one worker's scoring into the pass; all-failed workers are dropped
fn absorb(worker: &Worker, scoring: WorkerScoring, ctx: &ScoringContext, pass: &mut ScorePass) {
    for (dimension, err) in &scoring.failures {
        warn!(worker = %worker.id, %dimension, error = %err, "scorer failed, using failure score");
    }
    pass.scorer_failures += scoring.failures.len();

    if scoring.all_failed() {
        warn!(worker = %worker.id, "every scorer failed, dropping worker");
        pass.failed.push(worker.id.clone());
        return;
    }
    pass.scored.push(ScoredWorker {
        worker_id: worker.id.clone(),
        scores: scoring.scores,
        estimated_cost: ctx.estimated_cost(worker),
    });
}

/// Builder for [`SelectionEngine`]
pub struct SelectionEngineBuilder {
    registry: Option<Arc<dyn SnapshotSource>>,
    profiles: Option<Arc<dyn WeightProfileStore>>,
    classifier: Arc<dyn DomainClassifier>,
    learning: Arc<dyn LearningSignal>,
    scorers: ScorerTable,
    config: Config,
    trace_sink: Arc<dyn TraceSink>,
}

impl Default for SelectionEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionEngineBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            profiles: None,
            classifier: Arc::new(KeywordClassifier::new()),
            learning: Arc::new(NoLearning),
            scorers: ScorerTable::standard(),
            config: Config::default(),
            trace_sink: Arc::new(LogTraceSink),
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn registry(mut self, registry: Arc<dyn SnapshotSource>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn profiles(mut self, profiles: Arc<dyn WeightProfileStore>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn DomainClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn learning(mut self, learning: Arc<dyn LearningSignal>) -> Self {
        self.learning = learning;
        self
    }

    pub fn scorers(mut self, scorers: ScorerTable) -> Self {
        self.scorers = scorers;
        self
    }

    pub fn trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace_sink = sink;
        self
    }

    pub fn build(self) -> Result<SelectionEngine> {
        let registry = self
            .registry
            .ok_or_else(|| Error::ConfigError("a registry source is required".to_string()))?;
        self.config
            .validate()
            .map_err(|err| Error::ConfigError(err.to_string()))?;
        let profiles: Arc<dyn WeightProfileStore> = match self.profiles {
            Some(profiles) => profiles,
            None => match &self.config.profiles.catalog_path {
                Some(path) => Arc::new(ProfileCatalog::builtin_with_overrides(path)?),
                None => Arc::new(ProfileCatalog::builtin()?),
            },
        };
        let Config {
            engine,
            scoring,
            classifier,
            ..
        } = self.config;

        Ok(SelectionEngine {
            registry,
            resolver: WeightResolver::new(
                profiles,
                self.classifier,
                classifier.confidence_threshold,
            ),
            learning: self.learning,
            scorers: self.scorers,
            filter: FilterStage,
            rank: RankStage::new(engine.max_adjustment),
            select: SelectStage::new(engine.fallback_count),
            config: engine,
            scoring,
            trace_sink: self.trace_sink,
        })
    }
}
