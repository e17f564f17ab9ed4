//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;

/// Prefix for every environment variable read by [`EngineConfig::from_env`].
const ENV_PREFIX: &str = "INBOX_ASSIST_";

/// Model endpoint configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// When false the model path is skipped and only the rule/template path runs.
    pub enabled: bool,
    /// Base URL of the local model server.
    pub base_url: String,
    /// Model name passed with every request.
    pub model: String,
    /// Upper bound for a classification call.
    pub classify_timeout: Duration,
    /// Upper bound for a reply generation call.
    pub respond_timeout: Duration,
    /// Upper bound for the availability probe.
    pub probe_timeout: Duration,
    /// Sampling temperature for classification (near-deterministic).
    pub classify_temperature: f32,
    /// Sampling temperature for reply generation.
    pub respond_temperature: f32,
    pub top_p: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            classify_timeout: Duration::from_secs(30),
            respond_timeout: Duration::from_secs(45),
            probe_timeout: Duration::from_secs(2),
            classify_temperature: 0.1,
            respond_temperature: 0.7,
            top_p: 0.9,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model: ModelConfig,
    /// How many emails batch analytics classifies at once (1 = sequential).
    pub analytics_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            analytics_concurrency: 1,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `INBOX_ASSIST_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup, falling back to
    /// defaults for unset keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(v) = get("MODEL_ENABLED") {
            config.model.enabled = parse_bool("MODEL_ENABLED", &v)?;
        }
        if let Some(v) = get("MODEL_URL") {
            if !v.starts_with("http://") && !v.starts_with("https://") {
                return Err(invalid("MODEL_URL", format!("'{v}' is not an http(s) URL")));
            }
            config.model.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("MODEL_NAME") {
            config.model.model = v;
        }
        if let Some(v) = get("CLASSIFY_TIMEOUT_SECS") {
            config.model.classify_timeout = parse_secs("CLASSIFY_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("RESPOND_TIMEOUT_SECS") {
            config.model.respond_timeout = parse_secs("RESPOND_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("PROBE_TIMEOUT_SECS") {
            config.model.probe_timeout = parse_secs("PROBE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("ANALYTICS_CONCURRENCY") {
            let n: usize = v
                .parse()
                .map_err(|e| invalid("ANALYTICS_CONCURRENCY", format!("{e}")))?;
            if n == 0 {
                return Err(invalid("ANALYTICS_CONCURRENCY", "must be at least 1"));
            }
            config.analytics_concurrency = n;
        }

        Ok(config)
    }
}

fn invalid(name: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: format!("{ENV_PREFIX}{name}"),
        message: message.into(),
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(invalid(name, format!("'{other}' is not a boolean"))),
    }
}

fn parse_secs(name: &str, value: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = value.parse().map_err(|e| invalid(name, format!("{e}")))?;
    if secs == 0 {
        return Err(invalid(name, "timeout must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}
