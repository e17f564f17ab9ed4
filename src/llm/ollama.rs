//! HTTP adapter for an Ollama-compatible `/api/generate` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::LlmError;
use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider};

const PROVIDER: &str = "ollama";

/// Longest error body echoed back in `RequestFailed`.
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Default, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

/// Local model server client.
///
/// No overall request timeout is set here; the gateway bounds each call.
/// Connection setup is bounded by the probe timeout.
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    connect_timeout: Duration,
    probe_timeout: Duration,
}

impl OllamaProvider {
    pub fn new(config: &ModelConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.probe_timeout)
            .build()
            .map_err(|e| LlmError::Client {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            connect_timeout: config.probe_timeout,
            probe_timeout: config.probe_timeout,
        })
    }
}

/// Map a reqwest failure to a transport error.
///
/// Body read failures count as transport failures too: reqwest reports a
/// connection dropped mid-body as a decode error, and the body is parsed
/// separately. `limit` is the reqwest timeout that applied to the request.
fn transport_error(err: reqwest::Error, limit: Duration) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout {
            provider: PROVIDER.to_string(),
            timeout: limit,
        }
    } else {
        LlmError::Unreachable {
            provider: PROVIDER.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, self.probe_timeout))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                reason: "health check failed".to_string(),
            })
        }
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                top_p: request.top_p,
                num_predict: request.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.connect_timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, self.connect_timeout))?;

        if !status.is_success() {
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                reason: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)?;

        Ok(CompletionResponse {
            content: parsed.response,
            input_tokens: parsed.prompt_eval_count,
            output_tokens: parsed.eval_count,
        })
    }
}
