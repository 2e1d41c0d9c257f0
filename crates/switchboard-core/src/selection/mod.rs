//! Worker selection pipeline
//!
//! A request flows through four stages:
//!
//! - **Filter**: hard eligibility predicates remove workers that cannot
//!   serve the request (status, capabilities, tier, certifications, forced
//!   class, quality floor, price and latency ceilings, readiness).
//!
//! - **Score**: each survivor is scored 0-100 on eight independent
//!   dimensions.
//!
//! - **Rank**: dimension scores are combined with the resolved weight
//!   profile into a composite score, nudged by a bounded learning
//!   adjustment, and sorted with a deterministic tie-break.
//!
//! - **Select**: the top worker becomes the primary, the next few form the
//!   fallback chain, and a short justification is attached.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use switchboard_core::registry::{RegistrySnapshot, SharedRegistry};
//! use switchboard_core::selection::{Domain, RequestContext, SelectionEngine};
//!
//! let registry = SharedRegistry::new(RegistrySnapshot::from_json_file(path)?);
//! let engine = SelectionEngine::builder()
//!     .registry(Arc::new(registry))
//!     .build()?;
//!
//! let request = RequestContext::new().with_domain(Domain::Healthcare);
//! let result = engine.select(&request).await?;
//! println!("{} then {:?}", result.primary, result.fallbacks);
//! ```

pub mod engine;
pub mod filter;
pub mod rank;
pub mod resolve;
pub mod select;
pub mod trace;
pub mod types;

pub use engine::{SelectionEngine, SelectionEngineBuilder};
pub use filter::{EliminationBreakdown, FilterConstraints, FilterOutcome, FilterPredicate, FilterStage};
pub use rank::{RankStage, RankedCandidate, ScoredWorker, composite_score};
pub use resolve::{Resolution, WeightResolver};
pub use select::{SelectStage, Selection, SelectionFacts};
pub use trace::{LogTraceSink, MemoryTraceSink, SelectionTrace, StageTimings, TraceSink};
pub use types::{
    Dimension, DimensionScores, Domain, OptimizationPreference, RequestContext, ResolutionSource,
    SelectionMetadata, SelectionResult, SelectionState,
};
