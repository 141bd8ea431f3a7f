//! Application configuration for SupportFlow.
//!
//! User config lives at `~/.supportflow/supportflow.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SupportFlowError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "supportflow.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".supportflow";

/// Env var that overrides `[search] url`.
const SEARCH_URL_ENV: &str = "WEAVIATE_URL";

// ---------------------------------------------------------------------------
// Config structs (matching supportflow.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language-model endpoint settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Vector-search backend settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Pipeline tuning.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// HTTP transport settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_llm_api_base")]
    pub api_base: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,

    /// Model used by every stage.
    #[serde(default = "default_model")]
    pub model: String,

    /// HTTP timeout for a single completion call.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub classifier_temperature: f32,

    #[serde(default = "default_drafter_temperature")]
    pub drafter_temperature: f32,

    #[serde(default)]
    pub validator_temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_llm_api_base(),
            api_key_env: default_llm_api_key_env(),
            model: default_model(),
            timeout_secs: default_llm_timeout(),
            classifier_temperature: 0.0,
            drafter_temperature: default_drafter_temperature(),
            validator_temperature: 0.0,
        }
    }
}

fn default_llm_api_base() -> String {
    "https://api.openai.com/v1".into()
}
fn default_llm_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4-turbo".into()
}
fn default_llm_timeout() -> u64 {
    60
}
fn default_drafter_temperature() -> f32 {
    0.7
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Weaviate base URL.
    #[serde(default = "default_search_url")]
    pub url: String,

    /// Env var holding the Weaviate API key (optional for local deployments).
    #[serde(default = "default_search_api_key_env")]
    pub api_key_env: String,

    /// Env var whose value is forwarded as `X-OpenAI-Api-Key` for the
    /// server-side vectorizer.
    #[serde(default = "default_llm_api_key_env")]
    pub openai_key_env: String,

    /// Collection (class) holding the support document chunks.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// HTTP timeout for search and readiness calls.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: default_search_url(),
            api_key_env: default_search_api_key_env(),
            openai_key_env: default_llm_api_key_env(),
            collection: default_collection(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_url() -> String {
    "http://localhost:8080".into()
}
fn default_search_api_key_env() -> String {
    "WEAVIATE_API_KEY".into()
}
fn default_collection() -> String {
    "SupportDocs".into()
}
fn default_search_timeout() -> u64 {
    10
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Deadline applied to each stage's external call.
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,

    /// Confidence below which a draft always requires human review.
    #[serde(default = "default_review_threshold")]
    pub review_threshold: f64,

    /// Result limit for unfiltered searches.
    #[serde(default = "default_live_results")]
    pub live_results: usize,

    /// Result limit when the caller restricts the source documents.
    #[serde(default = "default_filtered_results")]
    pub filtered_results: usize,

    /// Characters of chunk content kept in each source preview.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout(),
            review_threshold: default_review_threshold(),
            live_results: default_live_results(),
            filtered_results: default_filtered_results(),
            preview_chars: default_preview_chars(),
        }
    }
}

fn default_stage_timeout() -> u64 {
    30
}
fn default_review_threshold() -> f64 {
    0.8
}
fn default_live_results() -> usize {
    3
}
fn default_filtered_results() -> usize {
    5
}
fn default_preview_chars() -> usize {
    150
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Characters per streamed SSE delta.
    #[serde(default = "default_chunk_chars")]
    pub stream_chunk_chars: usize,

    /// Pause between streamed deltas.
    #[serde(default = "default_chunk_delay")]
    pub stream_chunk_delay_ms: u64,

    /// Maximum chunks scanned when listing sources.
    #[serde(default = "default_sources_limit")]
    pub sources_limit: usize,

    /// Result limit for source suggestions.
    #[serde(default = "default_suggest_limit")]
    pub suggest_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            stream_chunk_chars: default_chunk_chars(),
            stream_chunk_delay_ms: default_chunk_delay(),
            sources_limit: default_sources_limit(),
            suggest_limit: default_suggest_limit(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".into()
}
fn default_chunk_chars() -> usize {
    10
}
fn default_chunk_delay() -> u64 {
    20
}
fn default_sources_limit() -> usize {
    100
}
fn default_suggest_limit() -> usize {
    5
}

impl AppConfig {
    /// Check values that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.llm.api_base).map_err(|e| {
            SupportFlowError::config(format!("invalid llm.api_base '{}': {e}", self.llm.api_base))
        })?;
        Url::parse(&self.search.url).map_err(|e| {
            SupportFlowError::config(format!("invalid search.url '{}': {e}", self.search.url))
        })?;

        if !(0.0..=1.0).contains(&self.pipeline.review_threshold) {
            return Err(SupportFlowError::config(format!(
                "pipeline.review_threshold must be within [0, 1], got {}",
                self.pipeline.review_threshold
            )));
        }
        if self.pipeline.live_results == 0 || self.pipeline.filtered_results == 0 {
            return Err(SupportFlowError::config(
                "pipeline result limits must be greater than zero",
            ));
        }
        if self.pipeline.stage_timeout_secs == 0 {
            return Err(SupportFlowError::config(
                "pipeline.stage_timeout_secs must be greater than zero",
            ));
        }
        if self.server.stream_chunk_chars == 0 {
            return Err(SupportFlowError::config(
                "server.stream_chunk_chars must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Apply environment overrides using the given lookup.
    pub fn apply_env_overrides_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(SEARCH_URL_ENV).filter(|v| !v.is_empty()) {
            tracing::debug!(%url, "search url overridden from {SEARCH_URL_ENV}");
            self.search.url = url;
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_with(|name| std::env::var(name).ok());
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.supportflow/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SupportFlowError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.supportflow/supportflow.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    let mut config = if path.exists() {
        load_config_from(&path)?
    } else {
        tracing::debug!(?path, "config file not found, using defaults");
        AppConfig::default()
    };

    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SupportFlowError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        SupportFlowError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Load from `path` when given, otherwise from the default location.
/// Environment overrides apply either way.
pub fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let Some(path) = path else {
        return load_config();
    };
    let mut config = load_config_from(path)?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SupportFlowError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SupportFlowError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SupportFlowError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the language-model API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.llm.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(SupportFlowError::config(format!(
            "LLM API key not found. Set the {var_name} environment variable."
        ))),
    }
}
