//! LLM integration for Inbox Assist.
//!
//! - `LlmProvider`: text-in/text-out completion seam (mocked in tests)
//! - `OllamaProvider`: HTTP adapter for a local Ollama-style server
//! - `ModelGateway`: prompt construction, structured-reply parsing and the
//!   per-call timeout used by the classification and response services

pub mod gateway;
pub mod ollama;

pub use gateway::ModelGateway;
pub use ollama::OllamaProvider;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ModelConfig;
use crate::error::LlmError;

/// A single-prompt completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: None,
            top_p: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Raw completion text plus token accounting when the server reports it.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A text completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Cheap liveness probe. Providers without one report healthy.
    async fn health_check(&self) -> Result<(), LlmError> {
        Ok(())
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

/// Create the configured provider.
pub fn create_provider(config: &ModelConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = OllamaProvider::new(config)?;
    tracing::info!(
        "Using local model endpoint {} (model: {})",
        config.base_url,
        config.model
    );
    Ok(Arc::new(provider))
}
