//! Reply templates and the deterministic template responder.
//!
//! A reply is framed as: tone greeting, category paragraph, a shared
//! follow-up line, tone sign-off. Category paragraphs are looked up by
//! `(category, tone)`, then `(category, professional)`, then the generic
//! acknowledgment, so every pair resolves.
//!
//! Placeholders: `{sender_name}` and `{subject}`, substituted verbatim.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::ConfigError;
use crate::pipeline::catalog::{CategoryCatalog, FALLBACK_CATEGORY};
use crate::pipeline::types::{
    ClassificationResult, GeneratedResponse, ResponseSource, Tone, sender_display_name,
};

const SENDER_PLACEHOLDER: &str = "{sender_name}";
const SUBJECT_PLACEHOLDER: &str = "{subject}";

const FOLLOW_UP_LINE: &str =
    "If you have any additional questions, please don't hesitate to reach out.";

const GENERIC_TEMPLATE: &str = "Thank you for your message about \"{subject}\". We have received it and \
     a member of our team will review it and respond within one business day.";

/// How a template lookup was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateMatch {
    /// `(category, tone)` entry.
    Exact,
    /// `(category, professional)` entry.
    Professional,
    /// Category-agnostic acknowledgment.
    Generic,
}

/// Static `(category, tone) → template` table.
#[derive(Debug, Clone)]
pub struct TemplateTable {
    entries: HashMap<(String, Tone), String>,
    generic: String,
}

impl TemplateTable {
    /// An empty table with only the generic acknowledgment.
    pub fn new(generic: impl Into<String>) -> Self {
        Self {
            entries: HashMap::new(),
            generic: generic.into(),
        }
    }

    pub fn with_entry(mut self, category: &str, tone: Tone, template: impl Into<String>) -> Self {
        self.entries
            .insert((category.to_string(), tone), template.into());
        self
    }

    /// Built-in templates for the default catalog.
    ///
    /// `service_outage` has no friendly/casual entries; those
    /// tones resolve to its professional text.
    pub fn default_templates() -> Self {
        use Tone::*;

        Self::new(GENERIC_TEMPLATE)
            .with_entry(
                "service_outage",
                Professional,
                "Thank you for reporting \"{subject}\". We are treating this as a service outage \
                 and our on-call engineers are already investigating. We will send status updates \
                 every hour until service is fully restored.",
            )
            .with_entry(
                "service_outage",
                Formal,
                "We acknowledge your report regarding \"{subject}\". The incident has been \
                 escalated to our operations team, and you will receive formal status updates \
                 until service is restored.",
            )
            .with_entry(
                "technical_support",
                Professional,
                "Thank you for reaching out regarding \"{subject}\". I understand how frustrating \
                 this must be. A technical specialist will respond within 24 hours with a resolution.",
            )
            .with_entry(
                "technical_support",
                Friendly,
                "Thanks for letting us know about \"{subject}\"! Technical problems are no fun. \
                 A technical specialist is on it and will get back to you within 24 hours.",
            )
            .with_entry(
                "technical_support",
                Formal,
                "We acknowledge receipt of your technical support request regarding \"{subject}\". \
                 Our engineering team will conduct a thorough investigation, and a technical \
                 specialist will respond within one business day.",
            )
            .with_entry(
                "technical_support",
                Casual,
                "Got it, thanks for the heads up on \"{subject}\". Our tech team will take a look \
                 and get back to you within 24 hours.",
            )
            .with_entry(
                "billing",
                Professional,
                "Thank you for contacting us about \"{subject}\". Your billing inquiry has been \
                 forwarded to accounts, and you can expect a follow-up within 2 business hours.",
            )
            .with_entry(
                "billing",
                Friendly,
                "Thanks for reaching out about \"{subject}\"! Your billing question has been \
                 forwarded to accounts and they'll get everything sorted out for you shortly.",
            )
            .with_entry(
                "billing",
                Formal,
                "We have received your billing inquiry regarding \"{subject}\". It has been \
                 forwarded to our accounts department, and any necessary adjustments will be \
                 processed within 2 business hours.",
            )
            .with_entry(
                "billing",
                Casual,
                "Thanks for the note about \"{subject}\". I've passed your billing question to \
                 accounts and they'll fix things up soon.",
            )
            .with_entry(
                "account",
                Professional,
                "Thank you for your inquiry about \"{subject}\". I will review your account details \
                 and send you the steps needed to resolve this within 4 business hours.",
            )
            .with_entry(
                "account",
                Friendly,
                "Thanks for reaching out about \"{subject}\"! I'm looking into your account now \
                 and will send you the next steps shortly.",
            )
            .with_entry(
                "account",
                Formal,
                "We acknowledge your account request regarding \"{subject}\". Our security team \
                 will review your account and provide the necessary assistance within 4 business hours.",
            )
            .with_entry(
                "account",
                Casual,
                "No worries about \"{subject}\". I'll check your account and send you the next \
                 steps soon.",
            )
            .with_entry(
                "integration",
                Professional,
                "Thank you for your inquiry about \"{subject}\". Our technical sales team will \
                 contact you within 24 hours with details on our API and CRM integration options.",
            )
            .with_entry(
                "integration",
                Friendly,
                "Thanks for asking about \"{subject}\"! We have some great API and CRM options, \
                 and our tech team will reach out with all the details within 24 hours.",
            )
            .with_entry(
                "integration",
                Formal,
                "We appreciate your interest expressed in \"{subject}\". Our technical team will \
                 provide comprehensive integration documentation within one business day.",
            )
            .with_entry(
                "integration",
                Casual,
                "Cool question about \"{subject}\". We've got solid API options and the team \
                 will send over the details soon.",
            )
            .with_entry(
                FALLBACK_CATEGORY,
                Professional,
                "Thank you for reaching out about \"{subject}\". I have received your inquiry and \
                 our team will respond with detailed information within 24 hours.",
            )
            .with_entry(
                FALLBACK_CATEGORY,
                Friendly,
                "Thanks for getting in touch about \"{subject}\"! I've got your message and will \
                 make sure you get the help you need within a day.",
            )
            .with_entry(
                FALLBACK_CATEGORY,
                Formal,
                "We acknowledge receipt of your inquiry regarding \"{subject}\". Our customer \
                 service team will provide a comprehensive response within one business day.",
            )
            .with_entry(
                FALLBACK_CATEGORY,
                Casual,
                "Thanks for the message about \"{subject}\". I'll make sure you get the info you \
                 need by tomorrow.",
            )
    }

    /// Resolve a template; never fails.
    pub fn resolve(&self, category: &str, tone: Tone) -> (&str, TemplateMatch) {
        if let Some(t) = self.entries.get(&(category.to_string(), tone)) {
            return (t, TemplateMatch::Exact);
        }
        if let Some(t) = self
            .entries
            .get(&(category.to_string(), Tone::Professional))
        {
            return (t, TemplateMatch::Professional);
        }
        (&self.generic, TemplateMatch::Generic)
    }

    /// Startup validation against the catalog.
    ///
    /// Rejects entries for unknown categories, templates without a
    /// `{subject}` placeholder, and any `(category, tone)` that resolves
    /// to empty text.
    pub fn validate(&self, catalog: &CategoryCatalog) -> Result<(), ConfigError> {
        let mut keys: Vec<&(String, Tone)> = self.entries.keys().collect();
        keys.sort_by(|a, b| (&a.0, a.1.as_str()).cmp(&(&b.0, b.1.as_str())));

        for key in keys {
            let (category, tone) = key;
            if !catalog.is_known(category) {
                return Err(ConfigError::InvalidValue {
                    key: format!("template.{category}.{tone}"),
                    message: format!("category '{category}' is not configured"),
                });
            }
            if !self.entries[key].contains(SUBJECT_PLACEHOLDER) {
                return Err(ConfigError::InvalidValue {
                    key: format!("template.{category}.{tone}"),
                    message: format!("template must contain {SUBJECT_PLACEHOLDER}"),
                });
            }
        }

        if !self.generic.trim().is_empty() && !self.generic.contains(SUBJECT_PLACEHOLDER) {
            return Err(ConfigError::InvalidValue {
                key: "template.generic".into(),
                message: format!("template must contain {SUBJECT_PLACEHOLDER}"),
            });
        }

        for category in catalog.names() {
            for tone in Tone::ALL {
                let (template, _) = self.resolve(category, tone);
                if template.trim().is_empty() {
                    return Err(ConfigError::ConfigurationMissing {
                        category: category.to_string(),
                        tone: tone.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Deterministic reply builder over a [`TemplateTable`].
#[derive(Debug, Clone)]
pub struct TemplateResponder {
    templates: Arc<TemplateTable>,
}

impl TemplateResponder {
    pub fn new(templates: Arc<TemplateTable>) -> Self {
        Self { templates }
    }

    /// Build a reply. Always succeeds with `source = template`.
    pub fn respond(
        &self,
        classification: &ClassificationResult,
        sender: &str,
        subject: &str,
        tone: Tone,
    ) -> GeneratedResponse {
        let (template, matched) = self.templates.resolve(&classification.category, tone);
        debug!(
            category = %classification.category,
            tone = %tone,
            matched = ?matched,
            "Resolved reply template"
        );

        let sender_name = sender_display_name(sender);
        let paragraph = render(template, &sender_name, subject);
        let text = format!(
            "{}\n\n{}\n\n{}\n\n{}",
            greeting(tone, &sender_name),
            paragraph,
            FOLLOW_UP_LINE,
            closing(tone)
        );

        GeneratedResponse {
            text,
            source: ResponseSource::Template,
        }
    }
}

fn render(template: &str, sender_name: &str, subject: &str) -> String {
    // Sender first so a subject containing "{sender_name}" stays verbatim.
    template
        .replace(SENDER_PLACEHOLDER, sender_name)
        .replace(SUBJECT_PLACEHOLDER, subject)
}

fn greeting(tone: Tone, sender_name: &str) -> String {
    match tone {
        Tone::Professional | Tone::Formal => format!("Dear {sender_name},"),
        Tone::Friendly => format!("Hi {sender_name}!"),
        Tone::Casual => format!("Hey {sender_name},"),
    }
}

fn closing(tone: Tone) -> &'static str {
    match tone {
        Tone::Professional => "Best regards,\nCustomer Support Team",
        Tone::Friendly => "Cheers!\nThe Support Team",
        Tone::Formal => "Sincerely,\nCustomer Service Department",
        Tone::Casual => "Talk soon!\nSupport Team",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::pipeline::types::{ClassificationSource, Priority};

    fn classification(category: &str) -> ClassificationResult {
        ClassificationResult {
            category: category.into(),
            priority: Priority::Medium,
            confidence: 1.0,
            reasoning: "test".into(),
            source: ClassificationSource::Rule,
        }
    }

    fn responder() -> TemplateResponder {
        TemplateResponder::new(Arc::new(TemplateTable::default_templates()))
    }

    #[test]
    fn default_templates_validate_against_default_catalog() {
        let catalog = CategoryCatalog::default_catalog().unwrap();
        TemplateTable::default_templates().validate(&catalog).unwrap();
    }

    #[test]
    fn every_category_and_tone_yields_name_and_subject() {
        let catalog = CategoryCatalog::default_catalog().unwrap();
        let r = responder();
        for category in catalog.names() {
            for tone in Tone::ALL {
                let reply = r.respond(
                    &classification(category),
                    "jane.smith@example.com",
                    "Order #42 is late",
                    tone,
                );
                assert_eq!(reply.source, ResponseSource::Template);
                assert!(!reply.text.trim().is_empty());
                assert!(reply.text.contains("Jane Smith"), "{category}/{tone}");
                assert!(reply.text.contains("Order #42 is late"), "{category}/{tone}");
            }
        }
    }

    #[test]
    fn missing_tone_falls_back_to_professional() {
        let table = TemplateTable::default_templates();
        let (casual, matched) = table.resolve("service_outage", Tone::Casual);
        assert_eq!(matched, TemplateMatch::Professional);
        let (professional, _) = table.resolve("service_outage", Tone::Professional);
        assert_eq!(casual, professional);

        let reply = responder().respond(
            &classification("service_outage"),
            "ops@example.com",
            "API is down",
            Tone::Casual,
        );
        assert!(reply.text.starts_with("Hey Ops,"));
        assert!(reply.text.contains("on-call engineers"));
    }

    #[test]
    fn unknown_category_uses_generic() {
        let table = TemplateTable::default_templates();
        let (_, matched) = table.resolve("sales", Tone::Friendly);
        assert_eq!(matched, TemplateMatch::Generic);
    }

    #[test]
    fn category_specific_next_steps() {
        let r = responder();
        let support = r.respond(
            &classification("technical_support"),
            "a@x.com",
            "Crash",
            Tone::Professional,
        );
        assert!(support.text.contains("technical specialist will respond within 24 hours"));

        let billing = r.respond(&classification("billing"), "a@x.com", "Invoice", Tone::Professional);
        assert!(billing.text.contains("billing inquiry has been forwarded to accounts"));
    }

    #[test]
    fn tone_controls_greeting_and_closing() {
        let r = responder();
        let friendly = r.respond(&classification("billing"), "sam@x.com", "Hi", Tone::Friendly);
        assert!(friendly.text.starts_with("Hi Sam!"));
        assert!(friendly.text.ends_with("Cheers!\nThe Support Team"));

        let formal = r.respond(&classification("billing"), "sam@x.com", "Hi", Tone::Formal);
        assert!(formal.text.starts_with("Dear Sam,"));
        assert!(formal.text.ends_with("Sincerely,\nCustomer Service Department"));
    }

    #[test]
    fn subject_is_not_reinterpreted() {
        let reply = responder().respond(
            &classification("billing"),
            "sam@x.com",
            "<b>{sender_name}</b>",
            Tone::Professional,
        );
        assert!(reply.text.contains("\"<b>{sender_name}</b>\""));
    }

    #[test]
    fn validation_rejects_unknown_category() {
        let catalog = CategoryCatalog::default_catalog().unwrap();
        let table = TemplateTable::new(GENERIC_TEMPLATE).with_entry("sales", Tone::Casual, "{subject}");
        assert!(table.validate(&catalog).is_err());
    }

    #[test]
    fn validation_rejects_template_without_subject() {
        let catalog = CategoryCatalog::default_catalog().unwrap();
        let table =
            TemplateTable::new(GENERIC_TEMPLATE).with_entry("billing", Tone::Casual, "Thanks!");
        assert!(table.validate(&catalog).is_err());
    }

    #[test]
    fn validation_reports_configuration_missing() {
        let catalog = CategoryCatalog::default_catalog().unwrap();
        let err = TemplateTable::new("  ").validate(&catalog).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigurationMissing { .. }));
    }
}
