//! Runtime configuration.
//!
//! Loaded from an optional YAML file; every field has a default so an empty
//! file (or no file) is a valid configuration.
//!
//! ```yaml
//! provider: groq
//! provider_config:
//!   base_url: https://api.groq.com/openai/v1
//! model: openai/gpt-oss-120b
//! temperature: 1.0
//! request_timeout: 2m
//! max_retries: 3
//! backoff_base: 1s
//! extensions: [pdf]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::evaluator::EvaluatorSettings;
use crate::providers::CompletionConfig;

/// Errors while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Everything a screening run can be tuned with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Registered provider name
    pub provider: String,

    /// Handed verbatim to the provider factory (`api_key`, `base_url`)
    pub provider_config: JsonValue,

    pub model: String,

    pub temperature: f32,

    pub max_completion_tokens: u32,

    pub top_p: f32,

    #[serde(with = "humantime_duration")]
    pub request_timeout: Duration,

    /// Attempts per document, including the first
    pub max_retries: u32,

    /// Delay unit for backoff; the wait after attempt `n` is `base * 2^n`
    #[serde(with = "humantime_duration")]
    pub backoff_base: Duration,

    /// Lines set in a font larger than this are marked as headers
    pub header_font_size: f32,

    /// File extensions picked up from the input folder, without the dot
    pub extensions: Vec<String>,
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            provider_config: serde_json::json!({}),
            model: "openai/gpt-oss-120b".to_string(),
            temperature: 1.0,
            max_completion_tokens: 8192,
            top_p: 1.0,
            request_timeout: Duration::from_secs(120),
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            header_font_size: 14.0,
            extensions: vec!["pdf".to_string()],
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // An empty file deserializes to unit, not to an empty map
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.trim().is_empty() {
            return Err(ConfigError::Invalid("provider must not be empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }
        if !self.provider_config.is_object() {
            return Err(ConfigError::Invalid(
                "provider_config must be a mapping".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ConfigError::Invalid(format!(
                "top_p must be within [0, 1], got {}",
                self.top_p
            )));
        }
        if self.max_completion_tokens == 0 {
            return Err(ConfigError::Invalid(
                "max_completion_tokens must be positive".to_string(),
            ));
        }
        if self.header_font_size.is_nan() || self.header_font_size <= 0.0 {
            return Err(ConfigError::Invalid(
                "header_font_size must be positive".to_string(),
            ));
        }
        if self.extensions.iter().all(|e| normalize_extension(e).is_empty()) {
            return Err(ConfigError::Invalid(
                "extensions must name at least one file type".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether `path` has one of the configured extensions (case-insensitive).
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .map(|e| normalize_extension(e))
            .any(|allowed| !allowed.is_empty() && allowed.eq_ignore_ascii_case(ext))
    }

    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_completion_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            timeout: self.request_timeout,
        }
    }

    pub fn evaluator_settings(&self) -> EvaluatorSettings {
        EvaluatorSettings {
            max_retries: self.max_retries,
            backoff_base: self.backoff_base,
            completion: self.completion_config(),
        }
    }
}

fn normalize_extension(ext: &str) -> &str {
    ext.trim().trim_start_matches('.')
}
