//! Engine configuration.
//!
//! Every tunable constant of the analysis engines lives here. A configuration
//! is validated once, wrapped in an `Arc` and never mutated afterwards.
//!
//! Defaults can be overridden from the environment (a `.env` file is read
//! first when present):
//! - `CONVINTEL_CONFIG_FILE`: JSON file with a full or partial configuration
//! - `CONVINTEL_SIMILARITY_THRESHOLD` (default: 0.15)
//! - `CONVINTEL_SIMILARITY_WINDOW`: turns per window; enables sliding-window scope
//! - `CONVINTEL_TRIGGER_WINDOW` (default: 5)
//! - `CONVINTEL_DEFAULT_DOMAIN` (default: banking)
//! - `CONVINTEL_MIN_DOMAIN_HITS` (default: 2)
//! - `CONVINTEL_FALLBACK_TO_DEFAULT_DOMAIN` (default: true)
//! - `CONVINTEL_REQUEST_DEADLINE_MS` (default: 5000)
//! - `CONVINTEL_SIGNAL_TIMEOUT_MS` (default: 1500)
//! - `CONVINTEL_POLICY_STORE_DIR` (default: data/policy_store)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

use crate::error::AppError;

pub const CONFIG_VERSION: &str = "2024.1";

/// What text the similarity check compares against each policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum SimilarityScope {
    /// The whole conversation at once.
    #[default]
    FullText,
    /// Consecutive windows of `turns` turns; the best window wins.
    SlidingWindow { turns: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ComplianceConfig {
    #[validate(range(min = 0.0, max = 1.0))]
    pub default_similarity_threshold: f32,
    /// Per-domain thresholds, keyed by lowercase domain name.
    pub domain_thresholds: BTreeMap<String, f32>,
    pub similarity_scope: SimilarityScope,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            default_similarity_threshold: 0.15,
            domain_thresholds: BTreeMap::new(),
            similarity_scope: SimilarityScope::FullText,
        }
    }
}

impl ComplianceConfig {
    /// Threshold for `domain`: explicit override, then corpus default, then global default.
    pub fn threshold_for(&self, domain: &str, corpus_default: Option<f32>) -> f32 {
        self.domain_thresholds
            .get(domain)
            .copied()
            .or(corpus_default)
            .unwrap_or(self.default_similarity_threshold)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ExposureConfig {
    /// Maximum token distance between a value and its trigger word.
    #[validate(range(min = 1))]
    pub trigger_window: usize,
    /// Confidence of a match whose trigger sits at the edge of the window.
    #[validate(range(min = 0.0, max = 1.0))]
    pub edge_confidence: f32,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            trigger_window: 5,
            edge_confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SentimentConfig {
    #[validate(range(min = 0.0, max = 1.0))]
    pub frustration_penalty: f32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub empathy_bonus: f32,
    /// Upper bound applied to amplifier multipliers.
    #[validate(range(min = 1.0, max = 4.0))]
    pub max_amplifier: f32,
    #[validate(range(min = 1))]
    pub rolling_window: usize,
    #[validate(range(min = 0.0, max = 2.0))]
    pub turning_point_delta: f32,
    #[validate(range(min = 1))]
    pub max_turning_points: usize,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            frustration_penalty: 0.3,
            empathy_bonus: 0.1,
            max_amplifier: 2.0,
            rolling_window: 3,
            turning_point_delta: 0.15,
            max_turning_points: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ToneConfig {
    #[validate(range(min = 0.0, max = 10.0))]
    pub aggression_threshold: f32,
    #[validate(range(min = 1))]
    pub short_reply_tokens: usize,
    #[validate(range(min = 1))]
    pub long_turn_tokens: usize,
    #[validate(range(min = 0.0, max = 1.0))]
    pub keyword_density: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            aggression_threshold: 0.6,
            short_reply_tokens: 5,
            long_turn_tokens: 20,
            keyword_density: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RiskConfig {
    #[validate(range(min = 0.0, max = 1.0))]
    pub compliance_weight: f32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub sentiment_weight: f32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub exposure_weight: f32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub high_threshold: f32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub medium_threshold: f32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            compliance_weight: 0.4,
            sentiment_weight: 0.3,
            exposure_weight: 0.3,
            high_threshold: 0.7,
            medium_threshold: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineConfig {
    #[validate(length(min = 1))]
    pub default_domain: String,
    #[validate(range(min = 1))]
    pub min_domain_hits: usize,
    /// Unknown explicit domains fall back to `default_domain` instead of being rejected.
    pub fallback_to_default_domain: bool,
    #[validate(range(min = 1))]
    pub request_deadline_ms: u64,
    #[validate(range(min = 1))]
    pub signal_timeout_ms: u64,
    pub policy_store_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_domain: "banking".to_string(),
            min_domain_hits: 2,
            fallback_to_default_domain: true,
            request_deadline_ms: 5000,
            signal_timeout_ms: 1500,
            policy_store_dir: PathBuf::from("data/policy_store"),
        }
    }
}

impl PipelineConfig {
    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }

    pub fn signal_timeout(&self) -> Duration {
        Duration::from_millis(self.signal_timeout_ms)
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EngineConfig {
    #[validate(length(min = 1))]
    pub version: String,
    #[validate(nested)]
    pub compliance: ComplianceConfig,
    #[validate(nested)]
    pub exposure: ExposureConfig,
    #[validate(nested)]
    pub sentiment: SentimentConfig,
    #[validate(nested)]
    pub tone: ToneConfig,
    #[validate(nested)]
    pub risk: RiskConfig,
    #[validate(nested)]
    pub pipeline: PipelineConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            compliance: ComplianceConfig::default(),
            exposure: ExposureConfig::default(),
            sentiment: SentimentConfig::default(),
            tone: ToneConfig::default(),
            risk: RiskConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parses a JSON configuration; missing fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let config: EngineConfig = serde_json::from_str(raw)
            .map_err(|e| AppError::Config(format!("malformed engine configuration: {}", e)))?;
        config.check()?;
        Ok(config)
    }

    /// Loads defaults, then an optional config file, then `CONVINTEL_*` overrides.
    pub fn from_env() -> Result<Self, AppError> {
        dotenv::dotenv().ok();

        let mut config = match std::env::var("CONVINTEL_CONFIG_FILE") {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path).map_err(|e| {
                    AppError::Config(format!("cannot read configuration file '{}': {}", path, e))
                })?;
                let config: EngineConfig = serde_json::from_str(&raw).map_err(|e| {
                    AppError::Config(format!("malformed configuration file '{}': {}", path, e))
                })?;
                config
            }
            Err(_) => EngineConfig::default(),
        };

        if let Some(threshold) = env_parse::<f32>("CONVINTEL_SIMILARITY_THRESHOLD")? {
            config.compliance.default_similarity_threshold = threshold;
        }
        if let Some(turns) = env_parse::<usize>("CONVINTEL_SIMILARITY_WINDOW")? {
            config.compliance.similarity_scope = SimilarityScope::SlidingWindow { turns };
        }
        if let Some(window) = env_parse::<usize>("CONVINTEL_TRIGGER_WINDOW")? {
            config.exposure.trigger_window = window;
        }
        if let Ok(domain) = std::env::var("CONVINTEL_DEFAULT_DOMAIN") {
            config.pipeline.default_domain = domain.trim().to_lowercase();
        }
        if let Some(hits) = env_parse::<usize>("CONVINTEL_MIN_DOMAIN_HITS")? {
            config.pipeline.min_domain_hits = hits;
        }
        if let Some(fallback) = env_parse::<bool>("CONVINTEL_FALLBACK_TO_DEFAULT_DOMAIN")? {
            config.pipeline.fallback_to_default_domain = fallback;
        }
        if let Some(ms) = env_parse::<u64>("CONVINTEL_REQUEST_DEADLINE_MS")? {
            config.pipeline.request_deadline_ms = ms;
        }
        if let Some(ms) = env_parse::<u64>("CONVINTEL_SIGNAL_TIMEOUT_MS")? {
            config.pipeline.signal_timeout_ms = ms;
        }
        if let Ok(dir) = std::env::var("CONVINTEL_POLICY_STORE_DIR") {
            config.pipeline.policy_store_dir = PathBuf::from(dir);
        }

        config.check()?;
        Ok(config)
    }

    /// Field ranges plus the cross-field rules the derive cannot express.
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()
            .map_err(|e| AppError::Config(format!("invalid engine configuration: {}", e)))?;

        if let SimilarityScope::SlidingWindow { turns } = self.compliance.similarity_scope {
            if turns == 0 {
                return Err(AppError::Config(
                    "similarity window must cover at least one turn".to_string(),
                ));
            }
        }
        for (domain, threshold) in &self.compliance.domain_thresholds {
            if !(0.0..=1.0).contains(threshold) {
                return Err(AppError::Config(format!(
                    "similarity threshold for '{}' must be within [0, 1], got {}",
                    domain, threshold
                )));
            }
        }
        if self.risk.medium_threshold > self.risk.high_threshold {
            return Err(AppError::Config(format!(
                "medium risk threshold {} exceeds high risk threshold {}",
                self.risk.medium_threshold, self.risk.high_threshold
            )));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(var: &str) -> Result<Option<T>, AppError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{} has an invalid value '{}'", var, raw))),
        Err(_) => Ok(None),
    }
}
