//! Resolver configuration
//!
//! Every scoring constant the pipeline uses lives here so deployments can tune
//! them from `config.toml` instead of patching code.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::assist::ApiFormat;
use crate::error::Result;

/// Top-level configuration for the resolver and its services
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub patterns: PatternConfig,
    pub semantic: SemanticConfig,
    pub cache: CacheConfig,
    pub preferences: PreferenceConfig,
    pub temporal: TemporalConfig,
    pub assistant: AssistantConfig,
}

/// Pattern matcher thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Rules weighted above this produce `high` confidence, the rest `medium`
    pub high_confidence_weight: f32,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            high_confidence_weight: 0.7,
        }
    }
}

/// Semantic index match weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    pub exact_weight: f32,
    pub partial_weight: f32,
    pub synonym_weight: f32,
    /// Lowest score an item with at least one match can have
    pub score_floor: f32,
    /// Best score must be strictly above this to be used
    pub min_usable_score: f32,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            exact_weight: 1.0,
            partial_weight: 0.7,
            synonym_weight: 0.5,
            score_floor: 0.3,
            min_usable_score: 0.3,
        }
    }
}

/// Result cache limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub capacity: usize,
    pub sweep_interval_secs: u64,
    /// Messages shorter than this (in characters) are never cached
    pub min_message_chars: usize,
    /// Requests carrying more attachments than this are never cached
    pub max_attachments: usize,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
            capacity: 1000,
            sweep_interval_secs: 60,
            min_message_chars: 3,
            max_attachments: 10,
        }
    }
}

/// Preference learner bonuses and decay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceConfig {
    pub enabled: bool,
    pub kind_bonus: f32,
    pub role_bonus: f32,
    pub recency_bonus: f32,
    pub keyword_bonus: f32,
    /// Usage count at which a record reaches full accuracy
    pub usage_saturation: u32,
    pub decay_days: f32,
    pub decay_floor: f32,
    /// Records unused for longer than this are pruned
    pub max_age_days: i64,
}

impl Default for PreferenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kind_bonus: 0.3,
            role_bonus: 0.2,
            recency_bonus: 0.2,
            keyword_bonus: 0.1,
            usage_saturation: 10,
            decay_days: 30.0,
            decay_floor: 0.5,
            max_age_days: 90,
        }
    }
}

/// Temporal analyzer decay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalConfig {
    pub decay_window_days: f32,
    pub decay_floor: f32,
    /// Window used by "recently"
    pub recent_window_minutes: i64,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            decay_window_days: 7.0,
            decay_floor: 0.3,
            recent_window_minutes: 60,
        }
    }
}

/// Language model boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub timeout_ms: u64,
    pub max_tokens: usize,
    pub format: ApiFormat,
    pub model: String,
    /// Endpoint override; the provider default is used when unset
    pub api_url: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl AssistantConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 8_000,
            max_tokens: 300,
            format: ApiFormat::Anthropic,
            model: "claude-3-5-haiku-latest".to_string(),
            api_url: None,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
        }
    }
}

impl ResolverConfig {
    /// Parse configuration from TOML text; missing keys keep their defaults
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)?;
        debug!("Loaded resolver config from {:?}", path);
        Ok(config)
    }

    /// Default config file location: `<config dir>/mediaref/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mediaref").join("config.toml"))
    }

    /// Load from the default location, falling back to defaults when the file
    /// is absent or invalid
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring invalid config at {:?}: {}", path, e);
                Self::default()
            }
        }
    }
}
