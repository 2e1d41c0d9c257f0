//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Switchboard configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub profiles: ProfilesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Soft end-to-end deadline for one selection
    pub latency_budget_ms: u64,
    /// Length of the fallback chain
    pub fallback_count: usize,
    /// Candidates scored when the budget forces the degrade path
    pub partial_scoring_cap: usize,
    /// Scorer calls in flight at once
    pub max_concurrent_scorers: usize,
    /// Bound on the learning adjustment, in composite points
    pub max_adjustment: f64,
    /// Ranked candidates included in the trace
    pub trace_top_n: usize,
    /// Wait for learning signals, never past the latency budget
    pub learning_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            latency_budget_ms: 50,
            fallback_count: 3,
            partial_scoring_cap: 16,
            max_concurrent_scorers: 64,
            max_adjustment: 2.0,
            trace_top_n: 5,
            learning_timeout_ms: 15,
        }
    }
}

impl EngineConfig {
    pub fn latency_budget(&self) -> Duration {
        Duration::from_millis(self.latency_budget_ms)
    }

    pub fn learning_timeout(&self) -> Duration {
        Duration::from_millis(self.learning_timeout_ms)
    }
}

/// Upper latency bound and the score awarded at or below it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyBand {
    pub max_ms: u64,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Bands in ascending `max_ms` order
    pub latency_bands: Vec<LatencyBand>,
    /// Score for latencies beyond the last band
    pub latency_floor_score: f64,
    /// Compliance points per held required certification
    pub compliance_increment: f64,
    /// Compliance score when every required certification is held
    pub compliant_base: f64,
    /// Compliance points per extra, non-required certification
    pub extra_certification_bonus: f64,
    /// Compliance score when nothing is required
    pub compliance_baseline: f64,
    /// Score substituted for a failed scorer call
    pub failed_dimension_score: f64,
    /// Learning score when no signal exists
    pub neutral_learning_score: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            latency_bands: vec![
                LatencyBand { max_ms: 250, score: 100.0 },
                LatencyBand { max_ms: 500, score: 90.0 },
                LatencyBand { max_ms: 1000, score: 75.0 },
                LatencyBand { max_ms: 2000, score: 55.0 },
                LatencyBand { max_ms: 5000, score: 30.0 },
            ],
            latency_floor_score: 10.0,
            compliance_increment: 25.0,
            compliant_base: 90.0,
            extra_certification_bonus: 5.0,
            compliance_baseline: 80.0,
            failed_dimension_score: 0.0,
            neutral_learning_score: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Detected domains below this confidence are ignored
    pub confidence_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilesConfig {
    /// TOML catalog layered over the built-in profiles
    pub catalog_path: Option<PathBuf>,
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("SWITCHBOARD_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("switchboard")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or use defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.engine.fallback_count > 16 {
            return Err(anyhow!("engine.fallback_count must be at most 16"));
        }
        if self.engine.partial_scoring_cap == 0 {
            return Err(anyhow!("engine.partial_scoring_cap must be at least 1"));
        }
        if self.engine.max_concurrent_scorers == 0 {
            return Err(anyhow!("engine.max_concurrent_scorers must be at least 1"));
        }
        if !self.engine.max_adjustment.is_finite() || self.engine.max_adjustment < 0.0 {
            return Err(anyhow!("engine.max_adjustment must be non-negative"));
        }
        for (key, value) in [
            ("scoring.compliance_increment", self.scoring.compliance_increment),
            ("scoring.extra_certification_bonus", self.scoring.extra_certification_bonus),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(anyhow!("{} must be non-negative, got {}", key, value));
            }
        }
        if !(0.0..=1.0).contains(&self.classifier.confidence_threshold) {
            return Err(anyhow!(
                "classifier.confidence_threshold must be between 0.0 and 1.0"
            ));
        }

        let bands = &self.scoring.latency_bands;
        if bands.windows(2).any(|w| w[0].max_ms >= w[1].max_ms) {
            return Err(anyhow!(
                "scoring.latency_bands must be sorted by strictly increasing max_ms"
            ));
        }
        let scores = bands
            .iter()
            .map(|b| b.score)
            .chain([
                self.scoring.latency_floor_score,
                self.scoring.compliance_baseline,
                self.scoring.compliant_base,
                self.scoring.failed_dimension_score,
                self.scoring.neutral_learning_score,
            ]);
        for score in scores {
            if !(0.0..=100.0).contains(&score) {
                return Err(anyhow!("scoring values must be between 0 and 100, got {}", score));
            }
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            // Engine settings
            "engine.latency_budget_ms" => Ok(self.engine.latency_budget_ms.to_string()),
            "engine.fallback_count" => Ok(self.engine.fallback_count.to_string()),
            "engine.partial_scoring_cap" => Ok(self.engine.partial_scoring_cap.to_string()),
            "engine.max_concurrent_scorers" => Ok(self.engine.max_concurrent_scorers.to_string()),
            "engine.max_adjustment" => Ok(self.engine.max_adjustment.to_string()),
            "engine.trace_top_n" => Ok(self.engine.trace_top_n.to_string()),
            "engine.learning_timeout_ms" => Ok(self.engine.learning_timeout_ms.to_string()),

            // Scoring settings
            "scoring.compliance_increment" => Ok(self.scoring.compliance_increment.to_string()),
            "scoring.compliant_base" => Ok(self.scoring.compliant_base.to_string()),
            "scoring.extra_certification_bonus" => {
                Ok(self.scoring.extra_certification_bonus.to_string())
            }
            "scoring.failed_dimension_score" => Ok(self.scoring.failed_dimension_score.to_string()),

            // Classifier settings
            "classifier.confidence_threshold" => {
                Ok(self.classifier.confidence_threshold.to_string())
            }

            // Profile settings
            "profiles.catalog_path" => Ok(self
                .profiles
                .catalog_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(built-in catalog)".to_string())),

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `switchboard config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    ///
    /// The configuration is left untouched unless the result validates.
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut updated = self.clone();
        updated.assign(key, value)?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    fn assign(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "engine.latency_budget_ms" => {
                self.engine.latency_budget_ms = value
                    .parse()
                    .with_context(|| format!("Invalid latency_budget_ms value: {}", value))?;
            }
            "engine.fallback_count" => {
                self.engine.fallback_count = value
                    .parse()
                    .with_context(|| format!("Invalid fallback_count value: {}", value))?;
            }
            "engine.partial_scoring_cap" => {
                self.engine.partial_scoring_cap = value
                    .parse()
                    .with_context(|| format!("Invalid partial_scoring_cap value: {}", value))?;
            }
            "engine.max_concurrent_scorers" => {
                self.engine.max_concurrent_scorers = value
                    .parse()
                    .with_context(|| format!("Invalid max_concurrent_scorers value: {}", value))?;
            }
            "engine.max_adjustment" => {
                self.engine.max_adjustment = value
                    .parse()
                    .with_context(|| format!("Invalid max_adjustment value: {}", value))?;
            }
            "engine.trace_top_n" => {
                self.engine.trace_top_n = value
                    .parse()
                    .with_context(|| format!("Invalid trace_top_n value: {}", value))?;
            }
            "engine.learning_timeout_ms" => {
                self.engine.learning_timeout_ms = value
                    .parse()
                    .with_context(|| format!("Invalid learning_timeout_ms value: {}", value))?;
            }
            "scoring.compliance_increment" => {
                self.scoring.compliance_increment = value
                    .parse()
                    .with_context(|| format!("Invalid compliance_increment value: {}", value))?;
            }
            "scoring.compliant_base" => {
                self.scoring.compliant_base = value
                    .parse()
                    .with_context(|| format!("Invalid compliant_base value: {}", value))?;
            }
            "scoring.extra_certification_bonus" => {
                self.scoring.extra_certification_bonus = value.parse().with_context(|| {
                    format!("Invalid extra_certification_bonus value: {}", value)
                })?;
            }
            "scoring.failed_dimension_score" => {
                self.scoring.failed_dimension_score = value
                    .parse()
                    .with_context(|| format!("Invalid failed_dimension_score value: {}", value))?;
            }
            "classifier.confidence_threshold" => {
                self.classifier.confidence_threshold = value
                    .parse()
                    .with_context(|| format!("Invalid confidence_threshold value: {}", value))?;
            }
            "profiles.catalog_path" => {
                self.profiles.catalog_path = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `switchboard config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = vec![
            "engine.latency_budget_ms",
            "engine.fallback_count",
            "engine.partial_scoring_cap",
            "engine.max_concurrent_scorers",
            "engine.max_adjustment",
            "engine.trace_top_n",
            "engine.learning_timeout_ms",
            "scoring.compliance_increment",
            "scoring.compliant_base",
            "scoring.extra_certification_bonus",
            "scoring.failed_dimension_score",
            "classifier.confidence_threshold",
            "profiles.catalog_path",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}
