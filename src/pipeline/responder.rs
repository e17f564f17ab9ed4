//! Response service: model draft first, templates as the fallback.
//!
//! Same policy as classification: `generate` is total and `source` tells
//! which path produced the text.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::ModelError;
use crate::llm::ModelGateway;
use crate::pipeline::templates::TemplateResponder;
use crate::pipeline::types::{ClassificationResult, EmailRecord, GeneratedResponse, Tone};

pub struct ResponseService {
    gateway: Option<Arc<ModelGateway>>,
    templates: TemplateResponder,
}

impl ResponseService {
    pub fn new(gateway: Option<Arc<ModelGateway>>, templates: TemplateResponder) -> Self {
        Self { gateway, templates }
    }

    /// Produce a reply for an already classified email. Never fails.
    pub async fn generate(
        &self,
        email: &EmailRecord,
        classification: &ClassificationResult,
        tone: Tone,
    ) -> GeneratedResponse {
        if let Some(gateway) = &self.gateway {
            match try_model(gateway, email, classification, tone).await {
                Ok(response) => {
                    info!(
                        sender = %email.sender(),
                        tone = %tone,
                        source = response.source.as_str(),
                        "Reply generated"
                    );
                    return response;
                }
                Err(e) => {
                    warn!(
                        sender = %email.sender(),
                        error = %e,
                        "Model reply failed, falling back to templates"
                    );
                }
            }
        }

        let response = self
            .templates
            .respond(classification, email.sender(), email.subject(), tone);
        info!(
            sender = %email.sender(),
            tone = %tone,
            source = response.source.as_str(),
            "Reply generated"
        );
        response
    }
}

async fn try_model(
    gateway: &ModelGateway,
    email: &EmailRecord,
    classification: &ClassificationResult,
    tone: Tone,
) -> Result<GeneratedResponse, ModelError> {
    gateway.probe().await?;
    debug!(model = gateway.model_name(), tone = %tone, "Drafting reply via model");
    gateway.respond_via_model(email, classification, tone).await
}
