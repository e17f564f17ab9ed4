//! Model gateway: structured prompts in, validated results out.
//!
//! Every call is bounded by a timeout. A stalled or unreachable endpoint is
//! `ModelError::Unavailable`; a reply that does not parse into every
//! required field is `ModelError::Malformed`. No retries, and no partially
//! trusted results.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ModelConfig;
use crate::error::ModelError;
use crate::llm::{CompletionRequest, LlmProvider};
use crate::pipeline::catalog::{CategoryCatalog, FALLBACK_CATEGORY};
use crate::pipeline::types::{
    ClassificationResult, ClassificationSource, EmailRecord, GeneratedResponse, Priority,
    ResponseSource, Tone,
};

/// Max tokens for the classification call (JSON object only).
const CLASSIFY_MAX_TOKENS: u32 = 256;

/// Max tokens for a reply draft.
const RESPOND_MAX_TOKENS: u32 = 600;

/// Email body characters embedded in a prompt.
const MAX_BODY_CHARS: usize = 4000;

/// Confidence assumed when the model omits one.
const DEFAULT_MODEL_CONFIDENCE: f32 = 0.8;

/// Adapter between the services and an [`LlmProvider`].
pub struct ModelGateway {
    provider: Arc<dyn LlmProvider>,
    catalog: Arc<CategoryCatalog>,
    config: ModelConfig,
}

impl ModelGateway {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        catalog: Arc<CategoryCatalog>,
        config: ModelConfig,
    ) -> Self {
        Self {
            provider,
            catalog,
            config,
        }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Availability probe, bounded by the probe timeout.
    pub async fn probe(&self) -> Result<(), ModelError> {
        match tokio::time::timeout(self.config.probe_timeout, self.provider.health_check()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                debug!(error = %e, "Model endpoint probe failed");
                Err(e.into())
            }
            Err(_) => {
                debug!(timeout = ?self.config.probe_timeout, "Model endpoint probe timed out");
                Err(ModelError::Unavailable(format!(
                    "{} did not answer the probe within {:?}",
                    self.provider.model_name(),
                    self.config.probe_timeout
                )))
            }
        }
    }

    pub async fn is_available(&self) -> bool {
        self.probe().await.is_ok()
    }

    /// Ask the model for category, priority and reasoning.
    pub async fn classify_via_model(
        &self,
        email: &EmailRecord,
    ) -> Result<ClassificationResult, ModelError> {
        let request = CompletionRequest::new(build_classification_prompt(email, &self.catalog))
            .with_temperature(self.config.classify_temperature)
            .with_top_p(self.config.top_p)
            .with_max_tokens(CLASSIFY_MAX_TOKENS);

        let raw = self.call(request, self.config.classify_timeout).await?;
        parse_classification(&raw, &self.catalog).inspect_err(|e| {
            warn!(raw_response = %raw, error = %e, "Unusable classification from model");
        })
    }

    /// Ask the model for a reply body.
    pub async fn respond_via_model(
        &self,
        email: &EmailRecord,
        classification: &ClassificationResult,
        tone: Tone,
    ) -> Result<GeneratedResponse, ModelError> {
        let request = CompletionRequest::new(build_response_prompt(email, classification, tone))
            .with_temperature(self.config.respond_temperature)
            .with_top_p(self.config.top_p)
            .with_max_tokens(RESPOND_MAX_TOKENS);

        let raw = self.call(request, self.config.respond_timeout).await?;
        let text = raw.trim();
        if text.is_empty() {
            return Err(ModelError::Malformed("empty reply text".into()));
        }
        Ok(GeneratedResponse {
            text: text.to_string(),
            source: ResponseSource::Model,
        })
    }

    async fn call(&self, request: CompletionRequest, limit: Duration) -> Result<String, ModelError> {
        match tokio::time::timeout(limit, self.provider.complete(request)).await {
            Ok(Ok(response)) => {
                debug!(
                    model = self.provider.model_name(),
                    input_tokens = response.input_tokens,
                    output_tokens = response.output_tokens,
                    "Model call completed"
                );
                Ok(response.content)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ModelError::Unavailable(format!(
                "model call timed out after {limit:?}"
            ))),
        }
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Classification prompt listing the configured categories.
pub(crate) fn build_classification_prompt(email: &EmailRecord, catalog: &CategoryCatalog) -> String {
    let mut prompt = String::with_capacity(1024);
    prompt.push_str(
        "Analyze the following email and classify it into a category and priority level.\n\n",
    );
    prompt.push_str("Email Details:\n");
    prompt.push_str(&format!("From: {}\n", email.sender()));
    prompt.push_str(&format!("Subject: {}\n", email.subject()));
    prompt.push_str(&format!("Body: {}\n\n", truncate(email.body(), MAX_BODY_CHARS)));

    prompt.push_str("Categories to choose from:\n");
    for category in catalog.categories() {
        let d = &category.definition;
        prompt.push_str(&format!("- {}: {}\n", d.name, d.description));
    }
    if catalog.get(FALLBACK_CATEGORY).is_none() {
        prompt.push_str(&format!(
            "- {FALLBACK_CATEGORY}: anything not fitting the categories above\n"
        ));
    }

    prompt.push_str(
        "\nPriority levels:\n\
         - high: urgent issues, system down, critical problems\n\
         - medium: important issues that need attention but are not critical\n\
         - low: general questions, non-urgent requests\n\n\
         Respond with ONLY a JSON object:\n\
         {\"category\": \"category_name\", \"priority\": \"high|medium|low\", \
         \"confidence\": 0.0, \"reasoning\": \"one sentence explaining the choice\"}",
    );
    prompt
}

/// Reply prompt embedding the classification and tone.
pub(crate) fn build_response_prompt(
    email: &EmailRecord,
    classification: &ClassificationResult,
    tone: Tone,
) -> String {
    let sender_name = email.sender_name();
    format!(
        "Generate a customer service email response for the following email.\n\n\
         Original Email:\n\
         From: {sender}\n\
         Subject: {subject}\n\
         Body: {body}\n\n\
         Email Category: {category}\n\
         Priority: {priority}\n\
         Required Tone: {tone}\n\n\
         Guidelines:\n\
         - Address the customer by name: {sender_name}\n\
         - Use a {tone} tone throughout\n\
         - Acknowledge their concern about \"{subject}\" specifically\n\
         - Provide helpful next steps\n\
         - Keep it concise but complete\n\
         - Do not include a subject line, only the email body\n\n\
         Generate only the email response text:",
        sender = email.sender(),
        subject = email.subject(),
        body = truncate(email.body(), MAX_BODY_CHARS),
        category = classification.category,
        priority = classification.priority,
    )
}

// ── Response parsing ────────────────────────────────────────────────

/// Model classification reply. Every field optional here so that a
/// missing one is reported by name instead of as a serde error.
#[derive(Debug, Deserialize)]
struct ModelClassification {
    category: Option<String>,
    priority: Option<String>,
    reasoning: Option<String>,
    confidence: Option<f64>,
}

/// Parse a model reply into a full classification, or reject it.
pub(crate) fn parse_classification(
    raw: &str,
    catalog: &CategoryCatalog,
) -> Result<ClassificationResult, ModelError> {
    let json_str = extract_json_object(raw);
    let parsed: ModelClassification = serde_json::from_str(&json_str)
        .map_err(|e| ModelError::Malformed(format!("JSON parse error: {e}")))?;

    let category = required(parsed.category, "category")?;
    let category = category.trim().to_lowercase().replace([' ', '-'], "_");
    if !catalog.is_known(&category) {
        return Err(ModelError::Malformed(format!(
            "unknown category: '{category}'"
        )));
    }

    let priority: Priority = required(parsed.priority, "priority")?
        .parse()
        .map_err(ModelError::Malformed)?;

    let reasoning = required(parsed.reasoning, "reasoning")?.trim().to_string();

    let confidence = parsed
        .confidence
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0) as f32)
        .unwrap_or(DEFAULT_MODEL_CONFIDENCE);

    Ok(ClassificationResult {
        category,
        priority,
        confidence,
        reasoning,
        source: ClassificationSource::Model,
    })
}

fn required(value: Option<String>, field: &str) -> Result<String, ModelError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ModelError::Malformed(format!("missing field '{field}'"))),
    }
}

/// Extract a JSON object from LLM output (handles markdown wrapping).
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::error::LlmError;
    use crate::llm::CompletionResponse;

    fn catalog() -> Arc<CategoryCatalog> {
        Arc::new(CategoryCatalog::default_catalog().unwrap())
    }

    fn email() -> EmailRecord {
        EmailRecord::new(
            "jane.doe@example.com",
            "Charged twice",
            "My card was charged twice this month.",
        )
        .unwrap()
    }

    /// Mock provider with a fixed reply, optional delay and health.
    struct MockLlm {
        reply: Result<String, ()>,
        delay: Duration,
        healthy: bool,
    }

    impl MockLlm {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                delay: Duration::ZERO,
                healthy: true,
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        fn model_name(&self) -> &str {
            "mock"
        }

        async fn health_check(&self) -> Result<(), LlmError> {
            if self.healthy {
                Ok(())
            } else {
                Err(LlmError::Unreachable {
                    provider: "mock".into(),
                    reason: "connection refused".into(),
                })
            }
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            tokio::time::sleep(self.delay).await;
            match &self.reply {
                Ok(content) => Ok(CompletionResponse {
                    content: content.clone(),
                    input_tokens: 10,
                    output_tokens: 5,
                }),
                Err(()) => Err(LlmError::Unreachable {
                    provider: "mock".into(),
                    reason: "connection refused".into(),
                }),
            }
        }
    }

    fn gateway(mock: MockLlm) -> ModelGateway {
        let config = ModelConfig {
            classify_timeout: Duration::from_millis(100),
            respond_timeout: Duration::from_millis(100),
            probe_timeout: Duration::from_millis(100),
            ..ModelConfig::default()
        };
        ModelGateway::new(Arc::new(mock), catalog(), config)
    }

    // ── Prompt tests ────────────────────────────────────────────────

    #[test]
    fn classification_prompt_lists_categories() {
        let prompt = build_classification_prompt(&email(), &catalog());
        assert!(prompt.contains("From: jane.doe@example.com"));
        assert!(prompt.contains("Subject: Charged twice"));
        for name in ["service_outage", "technical_support", "billing", "general"] {
            assert!(prompt.contains(&format!("- {name}:")), "{name}");
        }
        assert!(prompt.contains("JSON object"));
    }

    #[test]
    fn response_prompt_includes_tone_and_name() {
        let classification = parse_classification(
            r#"{"category": "billing", "priority": "medium", "reasoning": "double charge"}"#,
            &catalog(),
        )
        .unwrap();
        let prompt = build_response_prompt(&email(), &classification, Tone::Friendly);
        assert!(prompt.contains("Jane Doe"));
        assert!(prompt.contains("Required Tone: friendly"));
        assert!(prompt.contains("Email Category: billing"));
    }

    #[test]
    fn prompt_truncates_long_body() {
        let long = EmailRecord::new("a@x.com", "s", "y".repeat(10_000)).unwrap();
        let prompt = build_classification_prompt(&long, &catalog());
        assert!(prompt.len() < 6_000);
    }

    // ── Parsing tests ───────────────────────────────────────────────

    #[test]
    fn parses_complete_reply() {
        let result = parse_classification(
            r#"{"category": "Technical Support", "priority": "HIGH", "confidence": 0.93, "reasoning": "Login outage"}"#,
            &catalog(),
        )
        .unwrap();
        assert_eq!(result.category, "technical_support");
        assert_eq!(result.priority, Priority::High);
        assert!((result.confidence - 0.93).abs() < 1e-6);
        assert_eq!(result.source, ClassificationSource::Model);
    }

    #[test]
    fn missing_confidence_defaults_and_out_of_range_clamps() {
        let r = parse_classification(
            r#"{"category": "billing", "priority": "low", "reasoning": "x"}"#,
            &catalog(),
        )
        .unwrap();
        assert!((r.confidence - DEFAULT_MODEL_CONFIDENCE).abs() < 1e-6);

        let r = parse_classification(
            r#"{"category": "billing", "priority": "low", "reasoning": "x", "confidence": 7}"#,
            &catalog(),
        )
        .unwrap();
        assert_eq!(r.confidence, 1.0);
    }

    #[test]
    fn rejects_partial_replies() {
        let c = catalog();
        for raw in [
            r#"{"category": "billing", "priority": "low"}"#,
            r#"{"category": "billing", "reasoning": "x"}"#,
            r#"{"priority": "low", "reasoning": "x"}"#,
            r#"{"category": "billing", "priority": "low", "reasoning": "   "}"#,
        ] {
            assert!(
                matches!(parse_classification(raw, &c), Err(ModelError::Malformed(_))),
                "{raw}"
            );
        }
    }

    #[test]
    fn rejects_unknown_category_and_priority() {
        let c = catalog();
        assert!(parse_classification(
            r#"{"category": "sales", "priority": "low", "reasoning": "x"}"#,
            &c
        )
        .is_err());
        assert!(parse_classification(
            r#"{"category": "billing", "priority": "asap", "reasoning": "x"}"#,
            &c
        )
        .is_err());
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            parse_classification("I think this is about billing.", &catalog()),
            Err(ModelError::Malformed(_))
        ));
    }

    #[test]
    fn parses_reply_wrapped_in_markdown_or_prose() {
        let c = catalog();
        let fenced = "Here you go:\n```json\n{\"category\": \"account\", \"priority\": \"low\", \"reasoning\": \"verify\"}\n```";
        assert_eq!(parse_classification(fenced, &c).unwrap().category, "account");

        let prose = "Result: {\"category\": \"integration\", \"priority\": \"medium\", \"reasoning\": \"api\"} done.";
        assert_eq!(parse_classification(prose, &c).unwrap().category, "integration");
    }

    #[test]
    fn extract_json_direct_object() {
        let input = r#"{"category": "billing"}"#;
        assert_eq!(extract_json_object(input), input);
    }

    // ── Gateway tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn classify_via_model_success() {
        let gw = gateway(MockLlm::replying(
            r#"{"category": "billing", "priority": "medium", "reasoning": "double charge"}"#,
        ));
        let result = gw.classify_via_model(&email()).await.unwrap();
        assert_eq!(result.category, "billing");
        assert_eq!(result.source, ClassificationSource::Model);
    }

    #[tokio::test]
    async fn classify_via_model_malformed() {
        let gw = gateway(MockLlm::replying("no idea"));
        let err = gw.classify_via_model(&email()).await.unwrap_err();
        assert!(matches!(err, ModelError::Malformed(_)));
    }

    #[tokio::test]
    async fn unreachable_is_unavailable() {
        let gw = gateway(MockLlm {
            reply: Err(()),
            delay: Duration::ZERO,
            healthy: false,
        });
        assert!(!gw.is_available().await);
        let err = gw.classify_via_model(&email()).await.unwrap_err();
        assert!(matches!(err, ModelError::Unavailable(_)));
    }

    #[tokio::test]
    async fn stalled_call_times_out_as_unavailable() {
        let gw = gateway(MockLlm {
            reply: Ok("{}".into()),
            delay: Duration::from_secs(5),
            healthy: true,
        });
        let started = std::time::Instant::now();
        let err = gw.classify_via_model(&email()).await.unwrap_err();
        assert!(matches!(err, ModelError::Unavailable(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn respond_via_model_trims_and_rejects_empty() {
        let classification = parse_classification(
            r#"{"category": "billing", "priority": "medium", "reasoning": "x"}"#,
            &catalog(),
        )
        .unwrap();

        let gw = gateway(MockLlm::replying("  Hi Jane,\n\nWe refunded you.\n  "));
        let reply = gw
            .respond_via_model(&email(), &classification, Tone::Professional)
            .await
            .unwrap();
        assert_eq!(reply.text, "Hi Jane,\n\nWe refunded you.");
        assert_eq!(reply.source, ResponseSource::Model);

        let gw = gateway(MockLlm::replying("   "));
        let err = gw
            .respond_via_model(&email(), &classification, Tone::Professional)
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Malformed(_)));
    }
}
