//! TOML Configuration File Support
//!
//! Configuration loading for finchat, with an optional TOML file at
//! `~/.config/finchat/config.toml`.
//!
//! # Configuration Priority
//!
//! Values are resolved with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! The file lives at `$XDG_CONFIG_HOME/finchat/config.toml` (typically
//! `~/.config/finchat/config.toml`).
//!
//! # Example Configuration
//!
//! ```toml
//! [api]
//! url = "http://localhost:8080"
//! request_timeout_ms = 30000
//!
//! [stream]
//! retry_delay_ms = 2000
//! max_retries = 5
//! retry_jitter = false
//! end_sentinel = "[DONE]"
//! error_sentinel = "[ERROR]"
//!
//! [session]
//! reject_overlapping_submits = false
//! ```
//!
//! # Environment Variables
//!
//! `FINCHAT_API_URL`, `FINCHAT_REQUEST_TIMEOUT` (ms), `FINCHAT_RETRY_DELAY`
//! (ms), `FINCHAT_MAX_RETRIES`, `FINCHAT_RETRY_JITTER`,
//! `FINCHAT_REJECT_OVERLAPPING`.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionConfig;
use crate::streaming::Sentinels;
use crate::transport::RetryConfig;

/// Default API base URL
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[api]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiToml {
    /// Backend base URL
    pub url: Option<String>,

    /// Timeout for request/response calls in milliseconds
    pub request_timeout_ms: Option<u64>,
}

/// `[stream]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamToml {
    /// Delay before each reconnect in milliseconds
    pub retry_delay_ms: Option<u64>,

    /// Consecutive errors before giving up
    pub max_retries: Option<u32>,

    /// Whether to jitter the reconnect delay
    pub retry_jitter: Option<bool>,

    /// Payload that ends a reply
    pub end_sentinel: Option<String>,

    /// Payload that reports a generation failure
    pub error_sentinel: Option<String>,
}

/// `[session]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionToml {
    /// Refuse a submit while a reply is streaming
    pub reject_overlapping_submits: Option<bool>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FinchatToml {
    /// API section
    pub api: ApiToml,

    /// Stream section
    pub stream: StreamToml,

    /// Session section
    pub session: SessionToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved configuration
#[derive(Clone, Debug)]
pub struct FinchatConfig {
    /// Backend base URL, checked by [`FinchatConfig::validate`]
    pub api_url: String,

    /// Timeout for request/response calls
    pub request_timeout: Duration,

    /// Reconnect policy
    pub retry: RetryConfig,

    /// Reserved stream payloads
    pub sentinels: Sentinels,

    /// Refuse a submit while a reply is streaming
    pub reject_overlapping_submits: bool,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Highest-priority source that contributed a value
    source: ConfigSource,
}

impl Default for FinchatConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_millis(30_000),
            retry: RetryConfig::default(),
            sentinels: Sentinels::default(),
            reject_overlapping_submits: false,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl FinchatConfig {
    /// Create a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest-priority source that contributed a value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Parsed backend base URL
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the URL does not parse or
    /// cannot carry path segments.
    pub fn api_base(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.api_url).map_err(|e| {
            ConfigError::ValidationError(format!("api.url {:?}: {e}", self.api_url))
        })?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::ValidationError(format!(
                "api.url {url} cannot be used as a base URL"
            )));
        }
        Ok(url)
    }

    /// Settings for a chat session
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            sentinels: self.sentinels.clone(),
            retry: self.retry.clone(),
            reject_overlapping_submits: self.reject_overlapping_submits,
        }
    }

    /// Check invariants that parsing alone cannot
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "stream.max_retries must be at least 1".to_string(),
            ));
        }
        if self.sentinels.end_of_turn.is_empty() || self.sentinels.error.is_empty() {
            return Err(ConfigError::ValidationError(
                "stream sentinels must not be empty".to_string(),
            ));
        }
        if self.sentinels.end_of_turn == self.sentinels.error {
            return Err(ConfigError::ValidationError(format!(
                "end and error sentinels must differ (both are {:?})",
                self.sentinels.end_of_turn
            )));
        }
        self.api_base().map(|_| ())
    }
}

fn parse_flag(raw: &str) -> bool {
    raw != "0" && !raw.eq_ignore_ascii_case("false")
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/finchat/config.toml` or
/// `~/.config/finchat/config.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("finchat").join("config.toml"))
}

/// Load and validate configuration from the default path, environment and
/// defaults
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read or parsed,
/// or if the resolved values are invalid. A missing file is not an error.
pub fn load_config() -> Result<FinchatConfig, ConfigError> {
    let config = load_config_from_path(default_config_path())?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a specific path, without validating it
///
/// CLI overrides still have to be layered on, so validation is left to
/// [`ConfigOverrides::apply`] (or [`FinchatConfig::validate`]).
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<FinchatConfig, ConfigError> {
    let mut config = FinchatConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: FinchatToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);

    Ok(config)
}

fn apply_toml_config(config: &mut FinchatConfig, toml: &FinchatToml) {
    // API settings
    if let Some(ref url) = toml.api.url {
        config.api_url = url.clone();
    }
    if let Some(ms) = toml.api.request_timeout_ms {
        config.request_timeout = Duration::from_millis(ms);
    }

    // Stream settings
    if let Some(ms) = toml.stream.retry_delay_ms {
        config.retry.delay = Duration::from_millis(ms);
    }
    if let Some(max) = toml.stream.max_retries {
        config.retry.max_retries = max;
    }
    if let Some(jitter) = toml.stream.retry_jitter {
        config.retry.jitter = jitter;
    }
    if let Some(ref end) = toml.stream.end_sentinel {
        config.sentinels.end_of_turn = end.clone();
    }
    if let Some(ref error) = toml.stream.error_sentinel {
        config.sentinels.error = error.clone();
    }

    // Session settings
    if let Some(reject) = toml.session.reject_overlapping_submits {
        config.reject_overlapping_submits = reject;
    }
}

fn apply_env_config(config: &mut FinchatConfig) {
    if let Ok(url) = std::env::var("FINCHAT_API_URL") {
        config.api_url = url;
        config.source = ConfigSource::Env;
    }
    if let Ok(timeout) = std::env::var("FINCHAT_REQUEST_TIMEOUT") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.request_timeout = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %timeout, "Ignoring invalid FINCHAT_REQUEST_TIMEOUT");
        }
    }
    if let Ok(delay) = std::env::var("FINCHAT_RETRY_DELAY") {
        if let Ok(ms) = delay.parse::<u64>() {
            config.retry.delay = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %delay, "Ignoring invalid FINCHAT_RETRY_DELAY");
        }
    }
    if let Ok(max) = std::env::var("FINCHAT_MAX_RETRIES") {
        if let Ok(n) = max.parse::<u32>() {
            config.retry.max_retries = n;
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %max, "Ignoring invalid FINCHAT_MAX_RETRIES");
        }
    }
    if let Ok(jitter) = std::env::var("FINCHAT_RETRY_JITTER") {
        config.retry.jitter = parse_flag(&jitter);
        config.source = ConfigSource::Env;
    }
    if let Ok(reject) = std::env::var("FINCHAT_REJECT_OVERLAPPING") {
        config.reject_overlapping_submits = parse_flag(&reject);
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config_from_path`] to apply command-line argument
/// overrides; `apply` validates the final result.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// API base URL override
    pub api_url: Option<String>,

    /// Max retries override
    pub max_retries: Option<u32>,

    /// Overlap policy override
    pub reject_overlapping_submits: Option<bool>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set API URL override
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Set max retries override
    #[must_use]
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = Some(max);
        self
    }

    /// Set overlap policy override
    #[must_use]
    pub fn with_reject_overlapping_submits(mut self, reject: bool) -> Self {
        self.reject_overlapping_submits = Some(reject);
        self
    }

    /// Apply overrides and re-validate
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if an override breaks an
    /// invariant.
    pub fn apply(&self, config: &mut FinchatConfig) -> Result<(), ConfigError> {
        if self.api_url.is_some()
            || self.max_retries.is_some()
            || self.reject_overlapping_submits.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.api_url {
            config.api_url = url.clone();
        }
        if let Some(max) = self.max_retries {
            config.retry.max_retries = max;
        }
        if let Some(reject) = self.reject_overlapping_submits {
            config.reject_overlapping_submits = reject;
        }

        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
