//! Configuration loading, validation, and management for Mindloop.
//!
//! Loads configuration from `~/.mindloop/config.toml` with environment
//! variable overrides. Validates all settings at startup; an invalid
//! configuration prevents the runtime from serving requests.

use mindloop_core::plugin::Settings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.mindloop/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// The agent's display name
    #[serde(default = "default_agent_name")]
    pub agent_name: String,

    /// Short character description surfaced to the model
    #[serde(default)]
    pub bio: String,

    /// Pipeline timing and plan policy
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Plugin selection
    #[serde(default)]
    pub plugins: PluginsConfig,

    /// Logging output
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Free-form settings readable by plugins (API keys, endpoints, ...)
    #[serde(default)]
    pub settings: HashMap<String, String>,
}

fn default_agent_name() -> String {
    "Mindloop".into()
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Setting values routinely hold secrets; only show the keys.
        let mut setting_keys: Vec<&str> = self.settings.keys().map(String::as_str).collect();
        setting_keys.sort_unstable();
        f.debug_struct("AppConfig")
            .field("agent_name", &self.agent_name)
            .field("bio", &self.bio)
            .field("runtime", &self.runtime)
            .field("plugins", &self.plugins)
            .field("logging", &self.logging)
            .field("settings", &setting_keys)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Deadline for a whole message, in milliseconds (0 = no deadline)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Budget for a single provider call
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,

    /// Budget for a single evaluator call
    #[serde(default = "default_evaluator_timeout_ms")]
    pub evaluator_timeout_ms: u64,

    /// Budget for a single event handler call
    #[serde(default = "default_event_handler_timeout_ms")]
    pub event_handler_timeout_ms: u64,

    /// Abort the rest of a plan after the first failed step
    #[serde(default)]
    pub fail_fast_plans: bool,
}

fn default_request_timeout_ms() -> u64 {
    60_000
}
fn default_provider_timeout_ms() -> u64 {
    10_000
}
fn default_evaluator_timeout_ms() -> u64 {
    30_000
}
fn default_event_handler_timeout_ms() -> u64 {
    5_000
}

impl RuntimeConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn evaluator_timeout(&self) -> Duration {
        Duration::from_millis(self.evaluator_timeout_ms)
    }

    pub fn event_handler_timeout(&self) -> Duration {
        Duration::from_millis(self.event_handler_timeout_ms)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            provider_timeout_ms: default_provider_timeout_ms(),
            evaluator_timeout_ms: default_evaluator_timeout_ms(),
            event_handler_timeout_ms: default_event_handler_timeout_ms(),
            fail_fast_plans: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Plugin names to skip at startup
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl PluginsConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        !self.disabled.iter().any(|d| d == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.mindloop/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `MINDLOOP_AGENT_NAME`
    /// - `MINDLOOP_REQUEST_TIMEOUT_MS`
    /// - `MINDLOOP_LOG_FORMAT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup, then re-validate.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(name) = lookup("MINDLOOP_AGENT_NAME") {
            self.agent_name = name;
        }

        if let Some(raw) = lookup("MINDLOOP_REQUEST_TIMEOUT_MS") {
            self.runtime.request_timeout_ms = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "MINDLOOP_REQUEST_TIMEOUT_MS must be an integer, got '{raw}'"
                ))
            })?;
        }

        if let Some(format) = lookup("MINDLOOP_LOG_FORMAT") {
            self.logging.format = format;
        }

        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".mindloop")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "agent_name must not be empty".into(),
            ));
        }

        if self.runtime.provider_timeout_ms == 0
            || self.runtime.evaluator_timeout_ms == 0
            || self.runtime.event_handler_timeout_ms == 0
        {
            return Err(ConfigError::ValidationError(
                "provider, evaluator and event handler timeouts must be > 0".into(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be \"pretty\" or \"json\", got \"{}\"",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Configured settings first, then the process environment under the
/// upper-cased key.
impl Settings for AppConfig {
    fn get_setting(&self, key: &str) -> Option<String> {
        self.settings
            .get(key)
            .cloned()
            .or_else(|| std::env::var(key.to_uppercase()).ok())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agent_name: default_agent_name(),
            bio: String::new(),
            runtime: RuntimeConfig::default(),
            plugins: PluginsConfig::default(),
            logging: LoggingConfig::default(),
            settings: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for mindloop_core::Error {
    fn from(err: ConfigError) -> Self {
        mindloop_core::Error::Config {
            message: err.to_string(),
        }
    }
}
