//! Engine facade. Builds the static tables once and wires the services.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::llm::{LlmProvider, ModelGateway, create_provider};
use crate::pipeline::analytics::{AnalyticsAggregator, AnalyticsSummary};
use crate::pipeline::catalog::CategoryCatalog;
use crate::pipeline::classifier::ClassificationService;
use crate::pipeline::responder::ResponseService;
use crate::pipeline::rules::KeywordRuleClassifier;
use crate::pipeline::templates::{TemplateResponder, TemplateTable};
use crate::pipeline::types::{ClassificationResult, EmailRecord, GeneratedResponse, Tone};

/// Classification and reply for one email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageOutcome {
    pub classification: ClassificationResult,
    pub response: GeneratedResponse,
}

pub struct EmailAssistant {
    gateway: Option<Arc<ModelGateway>>,
    classifier: Arc<ClassificationService>,
    responder: ResponseService,
    analytics: AnalyticsAggregator,
}

impl EmailAssistant {
    /// Build from configuration with the default category and template tables.
    ///
    /// Fails on inconsistent tables (`ConfigError`) or when the HTTP client
    /// cannot be built. Does not contact the model endpoint.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let provider = if config.model.enabled {
            Some(create_provider(&config.model)?)
        } else {
            info!("Model disabled, using keyword rules and templates only");
            None
        };
        Self::with_provider(
            config,
            CategoryCatalog::default_catalog()?,
            TemplateTable::default_templates(),
            provider,
        )
    }

    /// Build from explicit tables and an optional provider.
    pub fn with_provider(
        config: &EngineConfig,
        catalog: CategoryCatalog,
        templates: TemplateTable,
        provider: Option<Arc<dyn LlmProvider>>,
    ) -> Result<Self> {
        templates.validate(&catalog)?;

        let catalog = Arc::new(catalog);
        let gateway = provider.map(|p| {
            Arc::new(ModelGateway::new(
                p,
                Arc::clone(&catalog),
                config.model.clone(),
            ))
        });

        info!(
            categories = catalog.categories().len(),
            model = gateway.as_ref().map(|g| g.model_name()).unwrap_or("none"),
            "Email assistant ready"
        );

        let classifier = Arc::new(ClassificationService::new(
            gateway.clone(),
            KeywordRuleClassifier::new(catalog),
        ));
        let responder = ResponseService::new(
            gateway.clone(),
            TemplateResponder::new(Arc::new(templates)),
        );
        let analytics =
            AnalyticsAggregator::new(Arc::clone(&classifier), config.analytics_concurrency);

        Ok(Self {
            gateway,
            classifier,
            responder,
            analytics,
        })
    }

    /// Probe the model endpoint once. `Ok` when the model is disabled.
    ///
    /// Informational only: classify and respond fall back on their own.
    pub async fn check_model(&self) -> Result<()> {
        if let Some(gateway) = &self.gateway {
            gateway.probe().await?;
        }
        Ok(())
    }

    pub fn model_enabled(&self) -> bool {
        self.gateway.is_some()
    }

    pub async fn classify(&self, email: &EmailRecord) -> ClassificationResult {
        self.classifier.classify(email).await
    }

    pub async fn respond(
        &self,
        email: &EmailRecord,
        classification: &ClassificationResult,
        tone: Tone,
    ) -> GeneratedResponse {
        self.responder.generate(email, classification, tone).await
    }

    /// Classify, then reply using that classification.
    pub async fn triage(&self, email: &EmailRecord, tone: Tone) -> TriageOutcome {
        let classification = self.classify(email).await;
        let response = self.respond(email, &classification, tone).await;
        TriageOutcome {
            classification,
            response,
        }
    }

    pub async fn summarize(&self, emails: &[EmailRecord]) -> AnalyticsSummary {
        self.analytics.summarize(emails).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::ModelConfig;
    use crate::error::{ConfigError, Error, ModelError};
    use crate::pipeline::types::{ClassificationSource, Priority, ResponseSource};

    fn offline_config() -> EngineConfig {
        EngineConfig {
            model: ModelConfig {
                enabled: false,
                ..ModelConfig::default()
            },
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn triage_without_model_uses_fallbacks() {
        let assistant = EmailAssistant::from_config(&offline_config()).unwrap();
        let email = EmailRecord::new(
            "jane.roe@corp.example",
            "Invoice #4411",
            "I was charged twice on my last invoice",
        )
        .unwrap();

        let outcome = assistant.triage(&email, Tone::Professional).await;
        assert_eq!(outcome.classification.category, "billing");
        assert_eq!(outcome.classification.priority, Priority::Medium);
        assert_eq!(outcome.classification.source, ClassificationSource::Rule);
        assert_eq!(outcome.response.source, ResponseSource::Template);
        assert!(outcome.response.text.starts_with("Dear Jane Roe,"));
        assert!(outcome.response.text.contains("Invoice #4411"));
    }

    #[tokio::test]
    async fn unreachable_model_degrades_to_fallbacks() {
        let config = EngineConfig {
            model: ModelConfig {
                base_url: "http://127.0.0.1:1".into(),
                ..ModelConfig::default()
            },
            ..EngineConfig::default()
        };
        let assistant = EmailAssistant::from_config(&config).unwrap();
        let email = EmailRecord::new("a@b.com", "Help", "My account is locked").unwrap();
        let outcome = assistant.triage(&email, Tone::Casual).await;
        assert_eq!(outcome.classification.source, ClassificationSource::Rule);
        assert_eq!(outcome.response.source, ResponseSource::Template);
    }

    #[tokio::test]
    async fn check_model_reports_unreachable_endpoint() {
        let config = EngineConfig {
            model: ModelConfig {
                base_url: "http://127.0.0.1:1".into(),
                ..ModelConfig::default()
            },
            ..EngineConfig::default()
        };
        let assistant = EmailAssistant::from_config(&config).unwrap();
        assert!(assistant.model_enabled());
        let err = assistant.check_model().await.unwrap_err();
        assert!(matches!(err, Error::Model(ModelError::Unavailable(_))), "{err:?}");

        let offline = EmailAssistant::from_config(&offline_config()).unwrap();
        assert!(!offline.model_enabled());
        assert!(offline.check_model().await.is_ok());
    }

    #[test]
    fn template_for_unknown_category_is_rejected() {
        let templates = TemplateTable::default_templates().with_entry(
            "refunds",
            Tone::Professional,
            "About {subject}.",
        );
        let result = EmailAssistant::with_provider(
            &offline_config(),
            CategoryCatalog::default_catalog().unwrap(),
            templates,
            None,
        );
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[tokio::test]
    async fn summarize_goes_through_classifier() {
        let assistant = EmailAssistant::from_config(&offline_config()).unwrap();
        let emails = vec![
            EmailRecord::new("a@b.com", "Login", "I can't log in to my account").unwrap(),
            EmailRecord::new("c@d.com", "Bill", "Question about my invoice").unwrap(),
        ];
        let summary = assistant.summarize(&emails).await;
        assert_eq!(summary.total, 2);
        assert_eq!(summary.sources[&ClassificationSource::Rule], 2);
    }
}
