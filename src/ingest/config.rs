// src/ingest/config.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::sink::AppendPolicy;
use crate::relevance::RelevanceRules;
use crate::retry::RetryPolicy;

pub const ENV_CONFIG_PATH: &str = "TIMELINE_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/timeline.toml";
pub const DEFAULT_JSON_PATH: &str = "config/timeline.json";

/// Immutable configuration handed to the pipeline at construction.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub relevance: RelevanceRules,
    #[serde(default)]
    pub translation: Option<TranslationConfig>,
    pub store: StoreConfig,
    #[serde(default)]
    pub timeline: TimelineConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// One registry entry. `name` partitions dedup watermarks.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    pub name: String,
    pub feed_url: String,
    /// Language of the feed text ("tr", "ar", ...). `None` lets the translator detect it.
    #[serde(default)]
    pub language: Option<String>,
    /// Secondary topical filter: at least one must appear in the item text.
    #[serde(default)]
    pub required_terms: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl SourceConfig {
    pub fn new(name: &str, feed_url: &str) -> Self {
        Self {
            name: name.to_string(),
            feed_url: feed_url.to_string(),
            language: None,
            required_terms: Vec::new(),
            enabled: true,
        }
    }

    pub fn source_language(&self) -> &str {
        self.language.as_deref().unwrap_or("auto")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationConfig {
    /// LibreTranslate-compatible `/translate` endpoint.
    pub endpoint: String,
    #[serde(default = "default_target_language")]
    pub target_language: String,
    /// Name of the env var holding the API key, if the endpoint needs one.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub spreadsheet_id: String,
    /// A1 range, e.g. "Turkiye Timeline of events!A:F".
    pub range: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimelineConfig {
    /// Fixed offset used to render (and parse back) the Date/Time columns.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    #[serde(default)]
    pub on_append_error: AppendPolicy,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            pacing_ms: default_pacing_ms(),
            on_append_error: AppendPolicy::default(),
        }
    }
}

impl SinkConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_target_language() -> String {
    "en".to_string()
}
fn default_token_env() -> String {
    "SHEETS_ACCESS_TOKEN".to_string()
}
fn default_pacing_ms() -> u64 {
    1_000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_timeout_secs() -> u64 {
    20
}
fn default_user_agent() -> String {
    "incident-timeline/0.1".to_string()
}

impl PipelineConfig {
    /// Minimal configuration: given sources, no predicates, no translation.
    pub fn new(sources: Vec<SourceConfig>, store: StoreConfig) -> Self {
        Self {
            sources,
            relevance: RelevanceRules::default(),
            translation: None,
            store,
            timeline: TimelineConfig::default(),
            sink: SinkConfig::default(),
            retry: RetryConfig::default(),
            http: HttpConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.sources.iter().any(|s| s.enabled) {
            bail!("config has no enabled sources");
        }
        let mut seen = HashSet::new();
        for s in &self.sources {
            if s.name.trim().is_empty() {
                bail!("source with empty name (feed {})", s.feed_url);
            }
            // Watermarks are keyed by the trimmed Source cell read back from the store.
            if s.name.trim() != s.name {
                bail!("source name `{}` has leading or trailing whitespace", s.name);
            }
            if s.feed_url.trim().is_empty() {
                bail!("source `{}` has an empty feed_url", s.name);
            }
            if !seen.insert(s.name.as_str()) {
                bail!("duplicate source name `{}`", s.name);
            }
        }
        if self.store.range.trim().is_empty() {
            bail!("store.range must not be empty");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be >= 1");
        }
        if self.timeline.utc_offset_minutes.abs() > 14 * 60 {
            bail!(
                "timeline.utc_offset_minutes out of range: {}",
                self.timeline.utc_offset_minutes
            );
        }
        Ok(())
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load config using env var + fallbacks:
/// 1) $TIMELINE_CONFIG_PATH
/// 2) config/timeline.toml
/// 3) config/timeline.json
pub fn load_config_default() -> Result<PipelineConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    for p in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        }
    }
    Err(anyhow!(
        "no config found (set {ENV_CONFIG_PATH} or create {DEFAULT_TOML_PATH})"
    ))
}

pub fn parse_config(s: &str, hint_ext: &str) -> Result<PipelineConfig> {
    let looks_json = s.trim_start().starts_with('{');
    if hint_ext == "json" || (hint_ext != "toml" && looks_json) {
        return serde_json::from_str(s).context("invalid JSON config");
    }
    toml::from_str(s).context("invalid TOML config")
}
