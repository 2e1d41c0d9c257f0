//! Weight profile catalog
//!
//! A weight profile is a named vector of eight dimension weights plus the
//! hard constraints that come with it (quality floor, certifications,
//! forced worker class, verification requirements). The catalog is data:
//! the built-in table is embedded TOML, custom catalogs are loaded the same
//! way, and every profile is validated once when the catalog is built.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::registry::{Certification, WorkerClass};
use crate::selection::types::{Dimension, Domain, OptimizationPreference};

const BUILTIN_CATALOG: &str = include_str!("builtin.toml");

/// Allowed deviation of a weight vector's sum from 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Non-negative per-dimension weights summing to 1.0
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DimensionWeights {
    pub quality: f64,
    pub cost: f64,
    pub latency: f64,
    pub capability: f64,
    pub reliability: f64,
    pub compliance: f64,
    pub availability: f64,
    pub learning: f64,
}

impl DimensionWeights {
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

    pub fn sum(&self) -> f64 {
        Dimension::ALL.iter().map(|d| self.get(*d)).sum()
    }
}

/// A named, validated weighting vector with its hard constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub weights: DimensionWeights,
    /// Minimum overall worker quality (0-100)
    #[serde(default)]
    pub min_quality: Option<f64>,
    #[serde(default)]
    pub required_certifications: BTreeSet<Certification>,
    /// Only workers of this class are eligible
    #[serde(default)]
    pub forced_class: Option<WorkerClass>,
    /// Tolerated epistemic disagreement before output is flagged (0.0-1.0)
    #[serde(default = "default_verification_threshold")]
    pub verification_threshold: f64,
    /// Output must be verified after generation
    #[serde(default)]
    pub requires_verification: bool,
    /// Output must cite its sources
    #[serde(default)]
    pub requires_citation: bool,
}

fn default_verification_threshold() -> f64 {
    0.5
}

impl WeightProfile {
    /// Check the load-time invariants of a single profile
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Error::InvalidProfile {
            id: self.id.clone(),
            message,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("profile id must not be empty".to_string()));
        }
        for dimension in Dimension::ALL {
            let weight = self.weights.get(dimension);
            if !weight.is_finite() || weight < 0.0 {
                return Err(invalid(format!(
                    "weight for {} must be a non-negative number, got {}",
                    dimension, weight
                )));
            }
        }
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(invalid(format!("weights sum to {:.4}, expected 1.0", sum)));
        }
        if let Some(floor) = self.min_quality {
            if !(0.0..=100.0).contains(&floor) {
                return Err(invalid(format!("min_quality {} outside 0-100", floor)));
            }
        }
        if !(0.0..=1.0).contains(&self.verification_threshold) {
            return Err(invalid(format!(
                "verification_threshold {} outside 0.0-1.0",
                self.verification_threshold
            )));
        }
        Ok(())
    }
}

/// Lookup interface the engine resolves profiles through
pub trait WeightProfileStore: Send + Sync {
    /// Profile by explicit id
    fn get_profile(&self, id: &str) -> Option<Arc<WeightProfile>>;

    /// Profile mapped to a domain, or the default when unmapped
    fn profile_for_domain(&self, domain: Domain) -> Arc<WeightProfile>;

    /// Profile mapped to an optimization preference
    fn profile_for_optimization(&self, preference: OptimizationPreference) -> Arc<WeightProfile>;

    fn default_profile(&self) -> Arc<WeightProfile>;
}

/// On-disk catalog layout
#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    default_profile: Option<String>,
    #[serde(default)]
    optimizations: HashMap<String, String>,
    #[serde(default)]
    domains: HashMap<String, String>,
    #[serde(default)]
    profiles: Vec<WeightProfile>,
}

/// Immutable, validated profile catalog with O(1) lookups
#[derive(Debug, Clone)]
pub struct ProfileCatalog {
    profiles: HashMap<String, Arc<WeightProfile>>,
    /// Catalog order, for listing
    order: Vec<String>,
    domains: HashMap<Domain, String>,
    optimizations: HashMap<OptimizationPreference, String>,
    default_id: String,
}

impl ProfileCatalog {
    /// The embedded built-in catalog
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    /// Build a standalone catalog from TOML
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(contents)?;
        Self::from_file(file)
    }

    /// Built-in catalog with a custom TOML catalog layered on top
    pub fn builtin_with_overrides(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let overrides: CatalogFile = toml::from_str(&contents)?;
        let mut base: CatalogFile = toml::from_str(BUILTIN_CATALOG)?;

        for profile in overrides.profiles {
            match base.profiles.iter_mut().find(|p| p.id == profile.id) {
                Some(existing) => *existing = profile,
                None => base.profiles.push(profile),
            }
        }
        base.domains.extend(overrides.domains);
        base.optimizations.extend(overrides.optimizations);
        if overrides.default_profile.is_some() {
            base.default_profile = overrides.default_profile;
        }

        Self::from_file(base)
    }

    fn from_file(file: CatalogFile) -> Result<Self> {
        let domains = file
            .domains
            .into_iter()
            .map(|(key, id)| {
                key.parse::<Domain>()
                    .map(|domain| (domain, id))
                    .map_err(Error::ConfigError)
            })
            .collect::<Result<HashMap<_, _>>>()?;
        let optimizations = file
            .optimizations
            .into_iter()
            .map(|(key, id)| {
                key.parse::<OptimizationPreference>()
                    .map(|pref| (pref, id))
                    .map_err(Error::ConfigError)
            })
            .collect::<Result<HashMap<_, _>>>()?;
        let default_id = file
            .default_profile
            .unwrap_or_else(|| Domain::General.as_str().to_string());

        Self::new(file.profiles, domains, optimizations, default_id)
    }

    /// Validate and index a set of profiles
    pub fn new(
        profiles: Vec<WeightProfile>,
        domains: HashMap<Domain, String>,
        optimizations: HashMap<OptimizationPreference, String>,
        default_id: String,
    ) -> Result<Self> {
        let mut indexed = HashMap::with_capacity(profiles.len());
        let mut order = Vec::with_capacity(profiles.len());

        for profile in profiles {
            profile.validate()?;
            if indexed.contains_key(&profile.id) {
                return Err(Error::InvalidProfile {
                    id: profile.id,
                    message: "duplicate profile id".to_string(),
                });
            }
            order.push(profile.id.clone());
            indexed.insert(profile.id.clone(), Arc::new(profile));
        }

        let missing = |id: &str, what: String| -> Result<()> {
            if indexed.contains_key(id) {
                Ok(())
            } else {
                Err(Error::ConfigError(format!(
                    "{} refers to unknown profile '{}'",
                    what, id
                )))
            }
        };

        missing(&default_id, "default_profile".to_string())?;
        for (domain, id) in &domains {
            missing(id, format!("domain '{}'", domain))?;
        }
        for preference in [
            OptimizationPreference::Balanced,
            OptimizationPreference::Cost,
            OptimizationPreference::Quality,
            OptimizationPreference::Latency,
        ] {
            let id = optimizations.get(&preference).ok_or_else(|| {
                Error::ConfigError(format!(
                    "no profile mapped for optimization preference '{}'",
                    preference
                ))
            })?;
            missing(id, format!("optimization '{}'", preference))?;
        }

        Ok(Self {
            profiles: indexed,
            order,
            domains,
            optimizations,
            default_id,
        })
    }

    /// Profiles in catalog order
    pub fn all(&self) -> impl Iterator<Item = &Arc<WeightProfile>> {
        self.order.iter().filter_map(|id| self.profiles.get(id))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Domain mapped to a profile id, if any
    pub fn domain_for_profile(&self, profile_id: &str) -> Option<Domain> {
        Domain::ALL
            .into_iter()
            .find(|d| self.domains.get(d).is_some_and(|id| id == profile_id))
    }

    fn lookup(&self, id: &str) -> Arc<WeightProfile> {
        // ids were checked against the index in `new`
        self.profiles
            .get(id)
            .or_else(|| self.profiles.get(&self.default_id))
            .cloned()
            .unwrap_or_else(|| Arc::new(fallback_profile()))
    }
}

/// Used only if an index invariant was broken
fn fallback_profile() -> WeightProfile {
    WeightProfile {
        id: Domain::General.as_str().to_string(),
        name: "General".to_string(),
        description: String::new(),
        weights: DimensionWeights {
            quality: 0.25,
            cost: 0.15,
            latency: 0.15,
            capability: 0.10,
            reliability: 0.10,
            compliance: 0.05,
            availability: 0.10,
            learning: 0.10,
        },
        min_quality: None,
        required_certifications: BTreeSet::new(),
        forced_class: None,
        verification_threshold: default_verification_threshold(),
        requires_verification: false,
        requires_citation: false,
    }
}

impl WeightProfileStore for ProfileCatalog {
    fn get_profile(&self, id: &str) -> Option<Arc<WeightProfile>> {
        self.profiles.get(id).cloned()
    }

    fn profile_for_domain(&self, domain: Domain) -> Arc<WeightProfile> {
        match self.domains.get(&domain) {
            Some(id) => self.lookup(id),
            None => self.default_profile(),
        }
    }

    fn profile_for_optimization(&self, preference: OptimizationPreference) -> Arc<WeightProfile> {
        match self.optimizations.get(&preference) {
            Some(id) => self.lookup(id),
            None => self.default_profile(),
        }
    }

    fn default_profile(&self) -> Arc<WeightProfile> {
        self.lookup(&self.default_id)
    }
}
