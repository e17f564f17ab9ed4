//! Error types for Inbox Assist.

use std::time::Duration;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// Configuration-related errors.
///
/// These surface at startup validation, never from a classify/respond call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("No template resolves for category {category} ({tone})")]
    ConfigurationMissing { category: String, tone: String },
}

/// Rejected caller input.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Invalid email record: {field} {reason}")]
    InvalidInput { field: String, reason: String },
}

impl InputError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Transport-level errors from an LLM provider.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Failed to build client for {provider}: {reason}")]
    Client { provider: String, reason: String },

    #[error("Provider {provider} unreachable: {reason}")]
    Unreachable { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Provider {provider} request failed with status {status}: {reason}")]
    RequestFailed {
        provider: String,
        status: u16,
        reason: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of a failed model-assisted call.
///
/// Callers treat both variants the same way (fall through to the
/// deterministic path); they stay distinct for logging.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Model response malformed: {0}")]
    Malformed(String),
}

impl From<LlmError> for ModelError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Client { .. }
            | LlmError::Unreachable { .. }
            | LlmError::Timeout { .. }
            | LlmError::RequestFailed { .. } => Self::Unavailable(err.to_string()),
            LlmError::Json(_) => Self::Malformed(err.to_string()),
        }
    }
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
