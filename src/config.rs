//! Configuration for the executor, optimizer, and service.
//!
//! All structs deserialize with missing fields defaulted, so a JSON file
//! only needs the keys it overrides.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::domain::DomainCategory;
use crate::error::{Error, Result};
use crate::verification::{VerificationLevel, VerificationStrategy};

/// Default learning rate for ranking updates.
pub const DEFAULT_LEARNING_RATE: f64 = 0.1;
/// Default probability of a pure exploration recommendation.
pub const DEFAULT_EXPLORATION_RATE: f64 = 0.2;
/// Default bound on retained performance records.
pub const DEFAULT_MAX_HISTORY_SIZE: usize = 1000;
/// Longest accepted result cache TTL (100 years).
pub const MAX_CACHE_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;
/// Default bound on cached composite results.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 1024;

/// Per-domain recommendation override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRule {
    /// Strategy that receives `strategy_bonus` when scored for this domain.
    #[serde(default)]
    pub preferred_strategy: Option<VerificationStrategy>,
    #[serde(default = "default_rule_bonus")]
    pub strategy_bonus: f64,
    /// Replaces the complexity-derived level for this domain.
    #[serde(default)]
    pub level: Option<VerificationLevel>,
}

fn default_rule_bonus() -> f64 {
    0.3
}

impl DomainRule {
    pub fn prefer(strategy: VerificationStrategy) -> Self {
        Self {
            preferred_strategy: Some(strategy),
            strategy_bonus: default_rule_bonus(),
            level: None,
        }
    }

    pub fn with_bonus(mut self, bonus: f64) -> Self {
        self.strategy_bonus = bonus;
        self
    }

    pub fn with_level(mut self, level: VerificationLevel) -> Self {
        self.level = Some(level);
        self
    }
}

/// Configuration for the strategy optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Step size of the ranking update (default: 0.1)
    pub learning_rate: f64,
    /// Probability of a uniformly random recommendation (default: 0.2)
    pub exploration_rate: f64,
    /// Retained performance records (default: 1000)
    pub max_history_size: usize,
    /// Named feature weights: `complexity`, `formal_nature`, `empirical_nature`
    pub feature_weights: HashMap<String, f64>,
    /// Nudge feature weights after confident outcomes
    pub enable_continual_learning: bool,
    pub domain_specific_rules: HashMap<DomainCategory, DomainRule>,
    /// Seed for the exploration RNG; entropy-seeded when unset
    pub seed: Option<u64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            learning_rate: DEFAULT_LEARNING_RATE,
            exploration_rate: DEFAULT_EXPLORATION_RATE,
            max_history_size: DEFAULT_MAX_HISTORY_SIZE,
            feature_weights: HashMap::new(),
            enable_continual_learning: true,
            domain_specific_rules: HashMap::new(),
            seed: None,
        }
    }
}

impl OptimizerConfig {
    pub fn with_learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_exploration_rate(mut self, rate: f64) -> Self {
        self.exploration_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_history_size(mut self, size: usize) -> Self {
        self.max_history_size = size;
        self
    }

    pub fn with_feature_weight(mut self, feature: impl Into<String>, weight: f64) -> Self {
        self.feature_weights.insert(feature.into(), weight);
        self
    }

    pub fn with_continual_learning(mut self, enabled: bool) -> Self {
        self.enable_continual_learning = enabled;
        self
    }

    pub fn with_domain_rule(mut self, domain: DomainCategory, rule: DomainRule) -> Self {
        self.domain_specific_rules.insert(domain, rule);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Reject values outside their meaningful range.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.learning_rate) {
            return Err(Error::Config(format!(
                "learning_rate must be in [0, 1], got {}",
                self.learning_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.exploration_rate) {
            return Err(Error::Config(format!(
                "exploration_rate must be in [0, 1], got {}",
                self.exploration_rate
            )));
        }
        Ok(())
    }
}

/// Configuration for the strategy executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Strategy used when the caller does not choose one
    pub default_strategy: VerificationStrategy,
    /// Level used when the caller does not choose one
    pub default_level: VerificationLevel,
    /// Concurrent gateway calls during parallel dispatch (default: 5)
    pub max_parallel: usize,
    pub enable_sensitivity_analysis: bool,
    /// Cached results expire after this many seconds; never when unset
    pub cache_ttl_secs: Option<u64>,
    /// Cached results kept before the least recently used is evicted (default: 1024)
    pub cache_max_entries: usize,
    /// Attach advisory recommendations to results
    pub generate_recommendations: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_strategy: VerificationStrategy::AdaptiveStrategy,
            default_level: VerificationLevel::Standard,
            max_parallel: 5,
            enable_sensitivity_analysis: true,
            cache_ttl_secs: None,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            generate_recommendations: true,
        }
    }
}

impl ExecutorConfig {
    pub fn with_default_strategy(mut self, strategy: VerificationStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    pub fn with_default_level(mut self, level: VerificationLevel) -> Self {
        self.default_level = level;
        self
    }

    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = max.max(1);
        self
    }

    pub fn with_sensitivity_analysis(mut self, enabled: bool) -> Self {
        self.enable_sensitivity_analysis = enabled;
        self
    }

    pub fn with_cache_ttl_secs(mut self, secs: u64) -> Self {
        self.cache_ttl_secs = Some(secs.min(MAX_CACHE_TTL_SECS));
        self
    }

    pub fn with_cache_max_entries(mut self, max: usize) -> Self {
        self.cache_max_entries = max.max(1);
        self
    }

    /// Cache TTL as a duration, capped at [`MAX_CACHE_TTL_SECS`].
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs
            .map(|secs| Duration::seconds(secs.min(MAX_CACHE_TTL_SECS) as i64))
    }

    /// Reject values outside their meaningful range.
    pub fn validate(&self) -> Result<()> {
        if let Some(secs) = self.cache_ttl_secs {
            if secs > MAX_CACHE_TTL_SECS {
                return Err(Error::Config(format!(
                    "cache_ttl_secs must be at most {}, got {}",
                    MAX_CACHE_TTL_SECS, secs
                )));
            }
        }
        if self.cache_max_entries == 0 {
            return Err(Error::Config("cache_max_entries must be positive".to_string()));
        }
        Ok(())
    }
}

/// Top-level configuration for [`crate::VerificationService`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub executor: ExecutorConfig,
    pub optimizer: OptimizerConfig,
}

impl ServiceConfig {
    /// Parse from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.executor.validate()?;
        config.optimizer.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }
}
