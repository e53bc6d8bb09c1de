use crate::models::ScoringWeights;
use crate::services::BackendProvider;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Root directory of the JSON object store
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { data_dir: default_data_dir() }
    }
}

fn default_data_dir() -> PathBuf { PathBuf::from("data") }

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringSettings {
    /// Completion backend; rule-based scoring only when absent
    #[serde(default)]
    pub backend: Option<BackendSettings>,
    #[serde(default)]
    pub weights: WeightsConfig,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            backend: None,
            weights: WeightsConfig::default(),
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_cache_capacity() -> u64 { 10_000 }
fn default_cache_ttl_secs() -> u64 { 3600 }

#[derive(Debug, Clone, Deserialize)]
pub struct BackendSettings {
    pub provider: BackendProvider,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_tokens() -> u32 { 1000 }
fn default_timeout_secs() -> u64 { 30 }

/// Rule-based scoring weights, in points per factor
#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_age_weight")]
    pub age: u32,
    #[serde(default = "default_location_weight")]
    pub location: u32,
    #[serde(default = "default_religion_weight")]
    pub religion: u32,
    #[serde(default = "default_children_weight")]
    pub children: u32,
    #[serde(default = "default_education_weight")]
    pub education: u32,
    #[serde(default = "default_career_weight")]
    pub career: u32,
    #[serde(default = "default_lifestyle_weight")]
    pub lifestyle: u32,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            age: default_age_weight(),
            location: default_location_weight(),
            religion: default_religion_weight(),
            children: default_children_weight(),
            education: default_education_weight(),
            career: default_career_weight(),
            lifestyle: default_lifestyle_weight(),
        }
    }
}

impl From<&WeightsConfig> for ScoringWeights {
    fn from(config: &WeightsConfig) -> Self {
        Self {
            age: config.age,
            location: config.location,
            religion: config.religion,
            children: config.children,
            education: config.education,
            career: config.career,
            lifestyle: config.lifestyle,
        }
    }
}

fn default_age_weight() -> u32 { 10 }
fn default_location_weight() -> u32 { 15 }
fn default_religion_weight() -> u32 { 20 }
fn default_children_weight() -> u32 { 15 }
fn default_education_weight() -> u32 { 5 }
fn default_career_weight() -> u32 { 5 }
fn default_lifestyle_weight() -> u32 { 2 }

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_min_score")]
    pub min_score: u8,
    /// Candidates of one profile scored at a time
    #[serde(default = "default_scoring_concurrency")]
    pub scoring_concurrency: usize,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            scoring_concurrency: default_scoring_concurrency(),
        }
    }
}

fn default_min_score() -> u8 { 30 }
fn default_scoring_concurrency() -> usize { 1 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with LOVEDASH__)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., LOVEDASH__MATCHING__MIN_SCORE -> matching.min_score
            .add_source(env_source())
            .build()?;

        settings.try_deserialize::<Self>().map(apply_env_fallbacks)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(env_source())
            .build()?;

        settings.try_deserialize::<Self>().map(apply_env_fallbacks)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("LOVEDASH")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Fill a missing backend API key from the provider's conventional variable
/// (ANTHROPIC_API_KEY or OPENAI_API_KEY)
fn apply_env_fallbacks(mut settings: Settings) -> Settings {
    if let Some(backend) = settings.scoring.backend.as_mut() {
        if backend.api_key.as_deref().map_or(true, str::is_empty) {
            let var = match backend.provider {
                BackendProvider::Anthropic => Some("ANTHROPIC_API_KEY"),
                BackendProvider::OpenAi => Some("OPENAI_API_KEY"),
                BackendProvider::Ollama => None,
            };
            backend.api_key = var.and_then(|name| std::env::var(name).ok());
        }
    }
    settings
}
