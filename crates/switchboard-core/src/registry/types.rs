//! Worker attribute types
//!
//! A worker is a model hosted by a provider. Everything here is read-only
//! input supplied by upstream registries; the engine never mutates it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A capability flag a worker can offer and a request can require
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Streaming,
    ToolUse,
    Vision,
    JsonMode,
    LongContext,
    Reasoning,
    Coding,
    Audio,
}

impl Capability {
    /// All capabilities in bit order
    pub const ALL: [Capability; 8] = [
        Self::Streaming,
        Self::ToolUse,
        Self::Vision,
        Self::JsonMode,
        Self::LongContext,
        Self::Reasoning,
        Self::Coding,
        Self::Audio,
    ];

    fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// Name used for benchmark lookup and display
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::ToolUse => "tool_use",
            Self::Vision => "vision",
            Self::JsonMode => "json_mode",
            Self::LongContext => "long_context",
            Self::Reasoning => "reasoning",
            Self::Coding => "coding",
            Self::Audio => "audio",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown capability: {}", s))
    }
}

/// Bitset of capabilities, serialized as a list of names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Capability>", into = "Vec<Capability>")]
pub struct CapabilitySet(u16);

impl CapabilitySet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.insert(capability);
        self
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// True when every capability in `other` is also in `self`
    pub fn is_superset(&self, other: &CapabilitySet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersection(&self, other: &CapabilitySet) -> CapabilitySet {
        CapabilitySet(self.0 & other.0)
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = Self::empty();
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}

impl From<Vec<Capability>> for CapabilitySet {
    fn from(value: Vec<Capability>) -> Self {
        value.into_iter().collect()
    }
}

impl From<CapabilitySet> for Vec<Capability> {
    fn from(value: CapabilitySet) -> Self {
        value.iter().collect()
    }
}

/// Compliance framework a worker can be certified for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Certification {
    Hipaa,
    Soc2,
    Gdpr,
    PciDss,
    Iso27001,
    Fedramp,
    Ccpa,
}

impl std::fmt::Display for Certification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hipaa => write!(f, "HIPAA"),
            Self::Soc2 => write!(f, "SOC2"),
            Self::Gdpr => write!(f, "GDPR"),
            Self::PciDss => write!(f, "PCI-DSS"),
            Self::Iso27001 => write!(f, "ISO27001"),
            Self::Fedramp => write!(f, "FedRAMP"),
            Self::Ccpa => write!(f, "CCPA"),
        }
    }
}

impl std::str::FromStr for Certification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "hipaa" => Ok(Self::Hipaa),
            "soc2" => Ok(Self::Soc2),
            "gdpr" => Ok(Self::Gdpr),
            "pcidss" => Ok(Self::PciDss),
            "iso27001" => Ok(Self::Iso27001),
            "fedramp" => Ok(Self::Fedramp),
            "ccpa" => Ok(Self::Ccpa),
            _ => Err(format!("Unknown certification: {}", s)),
        }
    }
}

/// Operational status set by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    #[default]
    Active,
    Disabled,
}

/// Current operational readiness of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessTier {
    /// Fully warm, serving immediately
    #[default]
    Hot,
    /// Warm pool, minor spin-up
    Warm,
    /// Capacity is being added
    Scaling,
    /// Cold but startable
    Cold,
    /// Cold with no warm-up path
    Unavailable,
}

impl ReadinessTier {
    /// Whether a request can be served from this tier at all
    pub fn is_serving(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }
}

impl std::fmt::Display for ReadinessTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hot => write!(f, "hot"),
            Self::Warm => write!(f, "warm"),
            Self::Scaling => write!(f, "scaling"),
            Self::Cold => write!(f, "cold"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Subscription tier, ordered from least to most privileged
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Standard,
    Professional,
    Enterprise,
}

impl std::str::FromStr for SubscriptionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "standard" => Ok(Self::Standard),
            "professional" | "pro" => Ok(Self::Professional),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(format!("Unknown subscription tier: {}", s)),
        }
    }
}

/// Broad class of a worker, targeted by a profile's forced-class constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerClass {
    #[default]
    Standard,
    Fast,
    HighReasoning,
}

impl std::fmt::Display for WorkerClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Fast => write!(f, "fast"),
            Self::HighReasoning => write!(f, "high_reasoning"),
        }
    }
}

/// A candidate execution target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    /// Stable identifier (e.g., "anthropic/claude-sonnet-4")
    pub id: String,
    /// Provider identifier
    pub provider: String,
    #[serde(default)]
    pub status: WorkerStatus,
    #[serde(default)]
    pub class: WorkerClass,
    #[serde(default)]
    pub capabilities: CapabilitySet,
    #[serde(default)]
    pub certifications: BTreeSet<Certification>,
    /// Overall benchmark quality (0-100)
    pub quality_score: f64,
    /// Per-capability benchmark scores (0-100), keyed by capability name
    #[serde(default)]
    pub benchmarks: BTreeMap<String, f64>,
    /// Cost per million input tokens
    pub input_cost_per_million: f64,
    /// Cost per million output tokens
    pub output_cost_per_million: f64,
    /// Expected latency to first token in milliseconds
    pub latency_ms: u64,
    /// Recent uptime percentage (0-100)
    pub uptime_percent: f64,
    /// Recent error rate (0.0-1.0)
    pub error_rate: f64,
    #[serde(default)]
    pub readiness: ReadinessTier,
    #[serde(default)]
    pub min_tier: SubscriptionTier,
}

impl Worker {
    /// Create a new worker with neutral defaults
    pub fn new(id: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            status: WorkerStatus::Active,
            class: WorkerClass::Standard,
            capabilities: CapabilitySet::empty(),
            certifications: BTreeSet::new(),
            quality_score: 70.0,
            benchmarks: BTreeMap::new(),
            input_cost_per_million: 1.0,
            output_cost_per_million: 5.0,
            latency_ms: 800,
            uptime_percent: 99.0,
            error_rate: 0.01,
            readiness: ReadinessTier::Hot,
            min_tier: SubscriptionTier::Free,
        }
    }

    /// Set pricing
    pub fn with_pricing(mut self, input: f64, output: f64) -> Self {
        self.input_cost_per_million = input;
        self.output_cost_per_million = output;
        self
    }

    /// Set capabilities
    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities = capabilities.into_iter().collect();
        self
    }

    /// Set certifications
    pub fn with_certifications(
        mut self,
        certifications: impl IntoIterator<Item = Certification>,
    ) -> Self {
        self.certifications = certifications.into_iter().collect();
        self
    }

    /// Set overall quality score
    pub fn with_quality(mut self, score: f64) -> Self {
        self.quality_score = score;
        self
    }

    /// Add a per-capability benchmark score
    pub fn with_benchmark(mut self, capability: Capability, score: f64) -> Self {
        self.benchmarks.insert(capability.as_str().to_string(), score);
        self
    }

    /// Set expected latency to first token
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Set reliability figures
    pub fn with_reliability(mut self, uptime_percent: f64, error_rate: f64) -> Self {
        self.uptime_percent = uptime_percent;
        self.error_rate = error_rate;
        self
    }

    pub fn with_readiness(mut self, readiness: ReadinessTier) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn with_status(mut self, status: WorkerStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_class(mut self, class: WorkerClass) -> Self {
        self.class = class;
        self
    }

    pub fn with_min_tier(mut self, tier: SubscriptionTier) -> Self {
        self.min_tier = tier;
        self
    }

    /// Estimate cost in USD for a given token count
    pub fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let input_cost = (input_tokens as f64 / 1_000_000.0) * self.input_cost_per_million;
        let output_cost = (output_tokens as f64 / 1_000_000.0) * self.output_cost_per_million;
        input_cost + output_cost
    }

    pub fn is_active(&self) -> bool {
        self.status == WorkerStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_set_superset() {
        let worker: CapabilitySet = [Capability::Streaming, Capability::Vision, Capability::ToolUse]
            .into_iter()
            .collect();
        let request = CapabilitySet::empty().with(Capability::Vision);

        assert!(worker.is_superset(&request));
        assert!(!request.is_superset(&worker));
        assert!(worker.is_superset(&CapabilitySet::empty()));
        assert_eq!(worker.intersection(&request).len(), 1);
    }

    #[test]
    fn test_capability_set_serializes_as_names() {
        let set: CapabilitySet = [Capability::Coding, Capability::Streaming].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["streaming","coding"]"#);

        let parsed: CapabilitySet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, set);
    }

    #[test]
    fn test_worker_estimate_cost() {
        let worker = Worker::new("test/model", "test").with_pricing(3.0, 15.0);

        let cost = worker.estimate_cost(1_000_000, 500_000);
        assert!((cost - 10.5).abs() < 0.001); // 3.0 + 7.5
    }

    #[test]
    fn test_subscription_tier_ordering() {
        assert!(SubscriptionTier::Enterprise > SubscriptionTier::Professional);
        assert!(SubscriptionTier::Standard > SubscriptionTier::Free);
        assert_eq!(
            "pro".parse::<SubscriptionTier>().unwrap(),
            SubscriptionTier::Professional
        );
    }

    #[test]
    fn test_certification_parse() {
        assert_eq!("PCI-DSS".parse::<Certification>().unwrap(), Certification::PciDss);
        assert_eq!("hipaa".parse::<Certification>().unwrap(), Certification::Hipaa);
        assert!("nope".parse::<Certification>().is_err());
    }

    #[test]
    fn test_worker_deserialize_defaults() {
        let json = r#"{
            "id": "p/m",
            "provider": "p",
            "quality_score": 80.0,
            "input_cost_per_million": 1.0,
            "output_cost_per_million": 2.0,
            "latency_ms": 400,
            "uptime_percent": 99.5,
            "error_rate": 0.02
        }"#;
        let worker: Worker = serde_json::from_str(json).unwrap();

        assert!(worker.is_active());
        assert_eq!(worker.readiness, ReadinessTier::Hot);
        assert!(worker.capabilities.is_empty());
        assert_eq!(worker.min_tier, SubscriptionTier::Free);
    }
}
