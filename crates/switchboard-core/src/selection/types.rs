//! Types for weighted worker selection
//!
//! This module defines the request context a caller hands to the engine,
//! the eight scoring dimensions, and the selection result it gets back.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::profiles::WeightProfile;
use crate::registry::{Capability, CapabilitySet, Certification, SubscriptionTier};

/// Request domain used to pick a domain weight profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    General,
    Healthcare,
    Legal,
    Financial,
    Scientific,
    Coding,
    Creative,
    Education,
    CustomerSupport,
    Research,
}

impl Domain {
    pub const ALL: [Domain; 10] = [
        Self::General,
        Self::Healthcare,
        Self::Legal,
        Self::Financial,
        Self::Scientific,
        Self::Coding,
        Self::Creative,
        Self::Education,
        Self::CustomerSupport,
        Self::Research,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Healthcare => "healthcare",
            Self::Legal => "legal",
            Self::Financial => "financial",
            Self::Scientific => "scientific",
            Self::Coding => "coding",
            Self::Creative => "creative",
            Self::Education => "education",
            Self::CustomerSupport => "customer_support",
            Self::Research => "research",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "general" => Ok(Self::General),
            "healthcare" | "medical" | "health" => Ok(Self::Healthcare),
            "legal" | "law" => Ok(Self::Legal),
            "financial" | "finance" => Ok(Self::Financial),
            "scientific" | "science" => Ok(Self::Scientific),
            "coding" | "code" | "programming" => Ok(Self::Coding),
            "creative" | "writing" => Ok(Self::Creative),
            "education" => Ok(Self::Education),
            "customer_support" | "support" => Ok(Self::CustomerSupport),
            "research" => Ok(Self::Research),
            _ => Err(format!("Unknown domain: {}", s)),
        }
    }
}

/// Named optimization preference mapped to a built-in profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationPreference {
    /// Balance cost, quality, and speed
    #[default]
    Balanced,
    /// Prioritize cost savings
    Cost,
    /// Prioritize quality over cost
    Quality,
    /// Prioritize time to first token
    Latency,
}

impl OptimizationPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::Cost => "cost",
            Self::Quality => "quality",
            Self::Latency => "latency",
        }
    }
}

impl std::str::FromStr for OptimizationPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "balanced" => Ok(Self::Balanced),
            "cost" | "cheap" => Ok(Self::Cost),
            "quality" => Ok(Self::Quality),
            "latency" | "fast" | "speed" => Ok(Self::Latency),
            _ => Err(format!("Unknown optimization preference: {}", s)),
        }
    }
}

impl std::fmt::Display for OptimizationPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the eight independent scoring axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Quality,
    Cost,
    Latency,
    Capability,
    Reliability,
    Compliance,
    Availability,
    Learning,
}

impl Dimension {
    pub const ALL: [Dimension; 8] = [
        Self::Quality,
        Self::Cost,
        Self::Latency,
        Self::Capability,
        Self::Reliability,
        Self::Compliance,
        Self::Availability,
        Self::Learning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Cost => "cost",
            Self::Latency => "latency",
            Self::Capability => "capability",
            Self::Reliability => "reliability",
            Self::Compliance => "compliance",
            Self::Availability => "availability",
            Self::Learning => "learning",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-dimension scores for one worker, each in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DimensionScores {
    pub quality: f64,
    pub cost: f64,
    pub latency: f64,
    pub capability: f64,
    pub reliability: f64,
    pub compliance: f64,
    pub availability: f64,
    pub learning: f64,
}

impl DimensionScores {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Quality => self.quality,
            Dimension::Cost => self.cost,
            Dimension::Latency => self.latency,
            Dimension::Capability => self.capability,
            Dimension::Reliability => self.reliability,
            Dimension::Compliance => self.compliance,
            Dimension::Availability => self.availability,
            Dimension::Learning => self.learning,
        }
    }

    pub fn set(&mut self, dimension: Dimension, value: f64) {
        let slot = match dimension {
            Dimension::Quality => &mut self.quality,
            Dimension::Cost => &mut self.cost,
            Dimension::Latency => &mut self.latency,
            Dimension::Capability => &mut self.capability,
            Dimension::Reliability => &mut self.reliability,
            Dimension::Compliance => &mut self.compliance,
            Dimension::Availability => &mut self.availability,
            Dimension::Learning => &mut self.learning,
        };
        *slot = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        Dimension::ALL.into_iter().map(|d| (d, self.get(d)))
    }
}

/// Per-call input to the selection engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Capabilities the worker must offer
    #[serde(default)]
    pub required_capabilities: CapabilitySet,
    /// Estimated input token count
    #[serde(default = "default_input_tokens")]
    pub estimated_input_tokens: u64,
    /// Estimated output token count
    #[serde(default = "default_output_tokens")]
    pub estimated_output_tokens: u64,
    /// Explicit domain, bypasses classification
    #[serde(default)]
    pub domain: Option<Domain>,
    /// Free-text content used for domain classification
    #[serde(default)]
    pub content: Option<String>,
    /// Explicit task-type tag used for domain classification
    #[serde(default)]
    pub task_type: Option<String>,
    /// Explicit weight profile id, highest resolution precedence
    #[serde(default)]
    pub profile_id: Option<String>,
    #[serde(default)]
    pub optimization: Option<OptimizationPreference>,
    /// Ceiling on estimated cost in USD
    #[serde(default)]
    pub max_cost_usd: Option<f64>,
    /// Ceiling on expected latency to first token
    #[serde(default)]
    pub max_latency_ms: Option<u64>,
    /// Floor on overall worker quality (0-100)
    #[serde(default)]
    pub min_quality: Option<f64>,
    #[serde(default)]
    pub required_certifications: BTreeSet<Certification>,
    /// Caller's subscription tier
    #[serde(default)]
    pub tier: SubscriptionTier,
}

fn default_input_tokens() -> u64 {
    1000
}

fn default_output_tokens() -> u64 {
    500
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Create a new request context with defaults
    pub fn new() -> Self {
        Self {
            required_capabilities: CapabilitySet::empty(),
            estimated_input_tokens: default_input_tokens(),
            estimated_output_tokens: default_output_tokens(),
            domain: None,
            content: None,
            task_type: None,
            profile_id: None,
            optimization: None,
            max_cost_usd: None,
            max_latency_ms: None,
            min_quality: None,
            required_certifications: BTreeSet::new(),
            tier: SubscriptionTier::Free,
        }
    }

    /// Set required capabilities
    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.required_capabilities = capabilities.into_iter().collect();
        self
    }

    /// Set estimated token counts
    pub fn with_estimated_tokens(mut self, input: u64, output: u64) -> Self {
        self.estimated_input_tokens = input;
        self.estimated_output_tokens = output;
        self
    }

    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    pub fn with_profile(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = Some(profile_id.into());
        self
    }

    pub fn with_optimization(mut self, preference: OptimizationPreference) -> Self {
        self.optimization = Some(preference);
        self
    }

    /// Set maximum cost constraint
    pub fn with_max_cost(mut self, max_cost: f64) -> Self {
        self.max_cost_usd = Some(max_cost);
        self
    }

    pub fn with_max_latency_ms(mut self, max_latency_ms: u64) -> Self {
        self.max_latency_ms = Some(max_latency_ms);
        self
    }

    pub fn with_min_quality(mut self, min_quality: f64) -> Self {
        self.min_quality = Some(min_quality);
        self
    }

    pub fn with_certifications(
        mut self,
        certifications: impl IntoIterator<Item = Certification>,
    ) -> Self {
        self.required_certifications = certifications.into_iter().collect();
        self
    }

    pub fn with_tier(mut self, tier: SubscriptionTier) -> Self {
        self.tier = tier;
        self
    }

    /// Stable SHA-256 digest of the request, used to key learning signals
    pub fn context_hash(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&canonical))
    }
}

/// How the weight profile for a request was chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Explicit profile id on the request
    ExplicitProfile,
    /// Named optimization preference
    Optimization { preference: OptimizationPreference },
    /// Explicit or detected domain
    Domain {
        domain: Domain,
        /// Classifier confidence, 1.0 for an explicit domain
        confidence: f64,
        detected: bool,
    },
    /// Nothing matched, or classifier confidence was too low
    Default,
}

/// Pipeline state of a single selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionState {
    Received,
    Filtered,
    Scored,
    Ranked,
    #[default]
    Selected,
    NoCandidates,
}

impl std::fmt::Display for SelectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Received => write!(f, "received"),
            Self::Filtered => write!(f, "filtered"),
            Self::Scored => write!(f, "scored"),
            Self::Ranked => write!(f, "ranked"),
            Self::Selected => write!(f, "selected"),
            Self::NoCandidates => write!(f, "no_candidates"),
        }
    }
}

/// Degradation and diagnosis facts attached to a result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectionMetadata {
    /// The latency budget forced scoring of a capped subset
    pub partial_scoring: bool,
    /// Workers in the registry snapshot
    pub candidates_total: usize,
    /// Workers that survived the filter stage
    pub candidates_eligible: usize,
    /// Workers that were fully scored and ranked
    pub candidates_scored: usize,
    /// Workers whose scoring did not finish within the latency budget
    #[serde(default)]
    pub timed_out_workers: Vec<String>,
    /// Workers dropped because every one of their scorers failed
    #[serde(default)]
    pub failed_workers: Vec<String>,
    /// Individual scorer failures replaced by the failure score
    pub scorer_failures: usize,
    /// Learning lookups that missed their deadline and scored neutral
    #[serde(default)]
    pub learning_timeouts: usize,
    pub registry_version: u64,
    /// Terminal pipeline state
    #[serde(default)]
    pub final_state: SelectionState,
}

/// Outcome of a successful selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    /// Primary worker id
    pub primary: String,
    /// Composite score after the learning adjustment
    pub composite_score: f64,
    /// Composite score before the learning adjustment
    pub raw_composite_score: f64,
    /// Primary worker's per-dimension breakdown
    pub scores: DimensionScores,
    /// Weight profile actually used
    pub profile: WeightProfile,
    pub resolution: ResolutionSource,
    /// Next-best workers in rank order
    pub fallbacks: Vec<String>,
    pub justification: String,
    pub elapsed: Duration,
    pub metadata: SelectionMetadata,
}

impl SelectionResult {
    /// Primary followed by the fallback chain
    pub fn chain(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.fallbacks.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimization_preference_parse() {
        assert_eq!(
            "balanced".parse::<OptimizationPreference>().unwrap(),
            OptimizationPreference::Balanced
        );
        assert_eq!(
            "FAST".parse::<OptimizationPreference>().unwrap(),
            OptimizationPreference::Latency
        );
        assert!("unknown".parse::<OptimizationPreference>().is_err());
    }

    #[test]
    fn test_domain_aliases() {
        assert_eq!("medical".parse::<Domain>().unwrap(), Domain::Healthcare);
        assert_eq!("customer-support".parse::<Domain>().unwrap(), Domain::CustomerSupport);
        for domain in Domain::ALL {
            assert_eq!(domain.as_str().parse::<Domain>().unwrap(), domain);
        }
    }

    #[test]
    fn test_dimension_scores_get_set() {
        let mut scores = DimensionScores::default();
        for (i, dimension) in Dimension::ALL.into_iter().enumerate() {
            scores.set(dimension, i as f64);
        }
        for (i, (dimension, value)) in scores.iter().enumerate() {
            assert_eq!(dimension, Dimension::ALL[i]);
            assert_eq!(value, i as f64);
        }
    }

    #[test]
    fn test_context_hash_is_stable_and_sensitive() {
        let a = RequestContext::new().with_capabilities([Capability::Vision]);
        let b = RequestContext::new().with_capabilities([Capability::Vision]);
        let c = RequestContext::new().with_capabilities([Capability::Coding]);

        assert_eq!(a.context_hash(), b.context_hash());
        assert_ne!(a.context_hash(), c.context_hash());
        assert_eq!(a.context_hash().len(), 64);
    }

    #[test]
    fn test_request_context_deserialize_defaults() {
        let ctx: RequestContext = serde_json::from_str(r#"{"domain": "healthcare"}"#).unwrap();
        assert_eq!(ctx.domain, Some(Domain::Healthcare));
        assert_eq!(ctx.estimated_input_tokens, 1000);
        assert_eq!(ctx.tier, SubscriptionTier::Free);
    }
}
