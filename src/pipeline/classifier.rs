//! Classification service: model first, keyword rules as the fallback.
//!
//! **Core invariant: `classify` is total.** Any model failure (probe fails,
//! timeout, malformed reply) falls through to the keyword rules. The
//! `source` field is the only trace of which path ran.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::ModelError;
use crate::llm::ModelGateway;
use crate::pipeline::rules::KeywordRuleClassifier;
use crate::pipeline::types::{ClassificationResult, EmailRecord};

pub struct ClassificationService {
    gateway: Option<Arc<ModelGateway>>,
    rules: KeywordRuleClassifier,
}

impl ClassificationService {
    /// `gateway = None` runs the keyword rules only.
    pub fn new(gateway: Option<Arc<ModelGateway>>, rules: KeywordRuleClassifier) -> Self {
        Self { gateway, rules }
    }

    pub fn rules(&self) -> &KeywordRuleClassifier {
        &self.rules
    }

    /// Classify one email. Never fails.
    pub async fn classify(&self, email: &EmailRecord) -> ClassificationResult {
        if let Some(gateway) = &self.gateway {
            match try_model(gateway, email).await {
                Ok(result) => {
                    info!(
                        sender = %email.sender(),
                        category = %result.category,
                        priority = %result.priority,
                        source = result.source.as_str(),
                        "Email classified"
                    );
                    return result;
                }
                Err(e) => {
                    warn!(
                        sender = %email.sender(),
                        error = %e,
                        "Model classification failed, falling back to keyword rules"
                    );
                }
            }
        }

        let result = self.rules.classify(&email.text());
        info!(
            sender = %email.sender(),
            category = %result.category,
            priority = %result.priority,
            source = result.source.as_str(),
            "Email classified"
        );
        result
    }
}

async fn try_model(
    gateway: &ModelGateway,
    email: &EmailRecord,
) -> Result<ClassificationResult, ModelError> {
    gateway.probe().await?;
    debug!(model = gateway.model_name(), "Classifying via model");
    gateway.classify_via_model(email).await
}
