//! Application configuration for Prospector.
//!
//! User config lives at `~/.prospector/prospector.toml`.
//! CLI flags override config file values, which override defaults.
//! Provider API keys are referenced by environment-variable name and are
//! never written to the config file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ProspectorError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "prospector.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".prospector";

// ---------------------------------------------------------------------------
// Config structs (matching prospector.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Company/contact directory provider (Apollo) settings.
    #[serde(default)]
    pub apollo: ApolloConfig,

    /// Generation provider (OpenRouter) settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Scoring thresholds.
    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Database path for the local profile store.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Number of discovered companies drawn for human validation.
    #[serde(default = "default_validation_sample_size")]
    pub validation_sample_size: usize,

    /// Result cap per directory search request.
    #[serde(default = "default_result_cap")]
    pub result_cap: u32,

    /// Contacts requested per discovery batch for a single company.
    #[serde(default = "default_contact_batch_size")]
    pub contact_batch_size: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            validation_sample_size: default_validation_sample_size(),
            result_cap: default_result_cap(),
            contact_batch_size: default_contact_batch_size(),
        }
    }
}

fn default_db_path() -> String {
    "~/.prospector/prospector.db".into()
}
fn default_validation_sample_size() -> usize {
    10
}
fn default_result_cap() -> u32 {
    25
}
fn default_contact_batch_size() -> u32 {
    10
}

/// `[apollo]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApolloConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_apollo_key_env")]
    pub api_key_env: String,

    /// API base URL.
    #[serde(default = "default_apollo_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_apollo_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApolloConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_apollo_key_env(),
            base_url: default_apollo_base_url(),
            timeout_secs: default_apollo_timeout(),
        }
    }
}

fn default_apollo_key_env() -> String {
    "APOLLO_API_KEY".into()
}
fn default_apollo_base_url() -> String {
    "https://api.apollo.io/v1".into()
}
fn default_apollo_timeout() -> u64 {
    30
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_openrouter_key_env")]
    pub api_key_env: String,

    /// API base URL.
    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,

    /// Default model for generation calls.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Request timeout in seconds.
    #[serde(default = "default_openrouter_timeout")]
    pub timeout_secs: u64,

    /// Minimum ms between consecutive generation calls.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Output token cap per generation call.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openrouter_key_env(),
            base_url: default_openrouter_base_url(),
            default_model: default_model(),
            timeout_secs: default_openrouter_timeout(),
            rate_limit_ms: default_rate_limit(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

fn default_openrouter_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "moonshotai/kimi-k2.5".into()
}
fn default_openrouter_timeout() -> u64 {
    60
}
fn default_rate_limit() -> u64 {
    1000
}
fn default_max_output_tokens() -> u32 {
    1024
}

/// `[scoring]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Score at or above which a candidate is labeled a hot match in
    /// summaries and exports. Candidates below are still shown.
    #[serde(default = "default_hot_threshold")]
    pub hot_threshold: u8,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            hot_threshold: default_hot_threshold(),
        }
    }
}

fn default_hot_threshold() -> u8 {
    70
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.prospector/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ProspectorError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.prospector/prospector.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ProspectorError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ProspectorError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ProspectorError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ProspectorError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ProspectorError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the database path, expanding a leading `~`.
pub fn resolve_db_path(config: &AppConfig) -> Result<PathBuf> {
    let raw = &config.defaults.db_path;
    if let Some(rest) = raw.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| ProspectorError::config("could not determine home directory"))?;
        Ok(home.join(rest))
    } else {
        Ok(PathBuf::from(raw))
    }
}

/// Read the API key named by `env_var`, failing with a config error.
pub fn resolve_api_key(env_var: &str) -> Result<String> {
    match std::env::var(env_var) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(ProspectorError::config(format!(
            "API key not found. Set the {env_var} environment variable."
        ))),
    }
}

/// Check that both provider API key env vars are set and non-empty.
pub fn validate_api_keys(config: &AppConfig) -> Result<()> {
    resolve_api_key(&config.apollo.api_key_env)?;
    resolve_api_key(&config.openrouter.api_key_env)?;
    Ok(())
}
