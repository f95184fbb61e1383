//! TOML configuration parsing.
//!
//! Every section carries defaults, so an empty file (or [`Config::minimal`])
//! yields a working resolver with the external model disabled.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    /// `"dir"` reads files from [`dir`](Self::dir); `"http"` fetches them
    /// relative to [`base_url`](Self::base_url).
    #[serde(default = "default_knowledge_source")]
    pub source: String,
    #[serde(default = "default_knowledge_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_knowledge_files")]
    pub files: Vec<String>,
    #[serde(default = "default_knowledge_timeout")]
    pub timeout_secs: u64,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            source: default_knowledge_source(),
            dir: default_knowledge_dir(),
            base_url: None,
            files: default_knowledge_files(),
            timeout_secs: default_knowledge_timeout(),
        }
    }
}

fn default_knowledge_source() -> String {
    "dir".to_string()
}
fn default_knowledge_dir() -> PathBuf {
    PathBuf::from("./data/syria_knowledge")
}
fn default_knowledge_files() -> Vec<String> {
    [
        "general.json",
        "cities.json",
        "culture.json",
        "economy.json",
        "government.json",
        "Real_post_liberation_events.json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_knowledge_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    300
}

/// Upper bound for `cache.ttl_secs` (one year).
pub const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Weights and threshold for the scored fuzzy pass, plus the category
/// priority used by the exact pass.
#[derive(Debug, Deserialize, Clone)]
pub struct MatcherConfig {
    #[serde(default = "default_variant_weight")]
    pub variant_weight: u32,
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: u32,
    #[serde(default = "default_answer_weight")]
    pub answer_weight: u32,
    #[serde(default = "default_min_score")]
    pub min_score: u32,
    #[serde(default = "default_priority_categories")]
    pub priority_categories: Vec<String>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            variant_weight: default_variant_weight(),
            keyword_weight: default_keyword_weight(),
            answer_weight: default_answer_weight(),
            min_score: default_min_score(),
            priority_categories: default_priority_categories(),
        }
    }
}

fn default_variant_weight() -> u32 {
    2
}
fn default_keyword_weight() -> u32 {
    3
}
fn default_answer_weight() -> u32 {
    1
}
fn default_min_score() -> u32 {
    2
}
fn default_priority_categories() -> Vec<String> {
    vec!["government".to_string(), "general".to_string()]
}

/// Additions to the built-in classifier lists. Built-ins are never removed.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub identity_answer: Option<String>,
    #[serde(default)]
    pub extra_identity_probes: Vec<String>,
    #[serde(default)]
    pub extra_domain_keywords: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_name")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_min_answer_chars")]
    pub min_answer_chars: usize,
    #[serde(default = "default_apology_max_chars")]
    pub apology_max_chars: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model_name(),
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_model_timeout(),
            history_window: default_history_window(),
            min_answer_chars: default_min_answer_chars(),
            apology_max_chars: default_apology_max_chars(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model_name() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.8
}
fn default_top_k() -> u32 {
    40
}
fn default_max_output_tokens() -> u32 {
    1024
}
fn default_model_timeout() -> u64 {
    30
}
fn default_history_window() -> usize {
    8
}
fn default_min_answer_chars() -> usize {
    10
}
fn default_apology_max_chars() -> usize {
    120
}

impl ModelConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8088".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Fallback filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// All defaults: local directory knowledge source, model disabled.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.cache.ttl_secs == 0 {
        anyhow::bail!("cache.ttl_secs must be > 0");
    }
    if config.cache.ttl_secs > MAX_CACHE_TTL_SECS {
        anyhow::bail!(
            "cache.ttl_secs must be <= {} (one year), got {}",
            MAX_CACHE_TTL_SECS,
            config.cache.ttl_secs
        );
    }

    if config.matcher.min_score < 1 {
        anyhow::bail!("matcher.min_score must be >= 1");
    }

    match config.knowledge.source.as_str() {
        "dir" => {}
        "http" => {
            if config.knowledge.base_url.is_none() {
                anyhow::bail!("knowledge.base_url must be set when source is 'http'");
            }
        }
        other => anyhow::bail!(
            "Unknown knowledge source: '{}'. Must be dir or http.",
            other
        ),
    }

    let model = &config.model;
    if !(0.0..=2.0).contains(&model.temperature) {
        anyhow::bail!("model.temperature must be in [0.0, 2.0]");
    }
    if !(model.top_p > 0.0 && model.top_p <= 1.0) {
        anyhow::bail!("model.top_p must be in (0.0, 1.0]");
    }
    if model.history_window == 0 {
        anyhow::bail!("model.history_window must be >= 1");
    }

    match model.provider.as_str() {
        "disabled" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown model provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }

    Ok(())
}
