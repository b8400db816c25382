//! Runtime configuration.
//!
//! Loaded from YAML (JSON is valid YAML), then adjusted from the
//! environment:
//!
//! ```yaml
//! provider: openai
//! model: gpt-4o
//! max_tokens: 1024
//! timeout: 60s
//! concurrency: 4
//! provider_options:
//!   base_url: http://localhost:8000/v1
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::providers::CompletionConfig;

/// Overrides `provider`.
pub const PROVIDER_ENV: &str = "RULECHECK_PROVIDER";

/// Overrides `model`.
pub const MODEL_ENV: &str = "RULECHECK_MODEL";

/// Overrides `timeout`; humantime syntax ("90s", "2m").
pub const TIMEOUT_ENV: &str = "RULECHECK_TIMEOUT";

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: {message}")]
    InvalidEnv { name: &'static str, message: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings for the grading runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Provider registry key
    pub provider: String,

    /// Model id passed to the provider
    pub model: String,

    /// Response cap
    pub max_tokens: u32,

    /// Per-request timeout
    #[serde(with = "duration_text")]
    pub timeout: Duration,

    /// Parallel evaluations in a batch
    pub concurrency: usize,

    /// Forwarded to the provider factory (`api_key`, `base_url`)
    pub provider_options: JsonValue,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 1024,
            timeout: Duration::from_secs(60),
            concurrency: 4,
            provider_options: JsonValue::Object(Default::default()),
        }
    }
}

impl RuntimeConfig {
    /// Parse from a YAML (or JSON) string.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load from a file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Apply `RULECHECK_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(provider) = lookup(PROVIDER_ENV) {
            self.provider = provider;
        }
        if let Some(model) = lookup(MODEL_ENV) {
            self.model = model;
        }
        if let Some(timeout) = lookup(TIMEOUT_ENV) {
            self.timeout =
                humantime::parse_duration(&timeout).map_err(|e| ConfigError::InvalidEnv {
                    name: TIMEOUT_ENV,
                    message: e.to_string(),
                })?;
        }
        Ok(self)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.trim().is_empty() {
            return Err(ConfigError::Invalid("provider must not be empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be positive".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be positive".to_string()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be positive".to_string()));
        }
        if !self.provider_options.is_object() {
            return Err(ConfigError::Invalid(
                "provider_options must be a mapping".to_string(),
            ));
        }
        if let Some(url) = self.provider_options.get("base_url") {
            match url.as_str() {
                Some(u) if u.starts_with("http://") || u.starts_with("https://") => {}
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "provider_options.base_url must be an http(s) URL, got {}",
                        url
                    )))
                }
            }
        }
        Ok(())
    }

    /// Request settings for the grading call. Temperature is always 0.0.
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: 0.0,
            timeout: self.timeout,
            ..CompletionConfig::default()
        }
    }
}

mod duration_text {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
