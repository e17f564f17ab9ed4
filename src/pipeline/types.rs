//! Shared types for the classification and response pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InputError;

// ── Email record ────────────────────────────────────────────────────

/// An email handed to the engine by the caller.
///
/// Validated on construction and immutable afterwards. Subject and body
/// may be empty; the sender must look like an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEmailRecord")]
pub struct EmailRecord {
    sender: String,
    subject: String,
    body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    received_at: Option<DateTime<Utc>>,
}

/// Unvalidated wire form of [`EmailRecord`].
#[derive(Debug, Deserialize)]
struct RawEmailRecord {
    sender: Option<String>,
    subject: Option<String>,
    body: Option<String>,
    #[serde(default)]
    received_at: Option<DateTime<Utc>>,
}

impl TryFrom<RawEmailRecord> for EmailRecord {
    type Error = InputError;

    fn try_from(raw: RawEmailRecord) -> Result<Self, Self::Error> {
        let sender = raw
            .sender
            .ok_or_else(|| InputError::invalid("sender", "is required"))?;
        let subject = raw
            .subject
            .ok_or_else(|| InputError::invalid("subject", "is required"))?;
        let body = raw
            .body
            .ok_or_else(|| InputError::invalid("body", "is required"))?;
        let record = Self::new(sender, subject, body)?;
        Ok(match raw.received_at {
            Some(at) => record.with_received_at(at),
            None => record,
        })
    }
}

impl EmailRecord {
    /// Build a record, rejecting a missing or non-address sender.
    pub fn new(
        sender: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Self, InputError> {
        let sender = sender.into().trim().to_string();
        validate_sender(&sender)?;
        Ok(Self {
            sender,
            subject: subject.into(),
            body: body.into(),
            received_at: None,
        })
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = Some(received_at);
        self
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    /// Subject and body joined, the text both classification paths read.
    pub fn text(&self) -> String {
        format!("{} {}", self.subject, self.body)
    }

    /// Human-readable name derived from the sender address.
    pub fn sender_name(&self) -> String {
        sender_display_name(&self.sender)
    }
}

fn validate_sender(sender: &str) -> Result<(), InputError> {
    if sender.is_empty() {
        return Err(InputError::invalid("sender", "must not be blank"));
    }
    if sender.chars().any(char::is_whitespace) {
        return Err(InputError::invalid("sender", "must not contain whitespace"));
    }
    match sender.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(())
        }
        _ => Err(InputError::invalid(
            "sender",
            format!("'{sender}' is not an email address"),
        )),
    }
}

/// Turn `john.doe@example.com` into `John Doe`.
pub fn sender_display_name(sender: &str) -> String {
    let local = sender.split('@').next().unwrap_or(sender);
    let words: Vec<String> = local
        .split(['.', '_', '-'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        sender.to_string()
    } else {
        words.join(" ")
    }
}

// ── Priority / tone ─────────────────────────────────────────────────

/// Urgency tier. Ordered so that `High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown priority: '{other}'")),
        }
    }
}

/// Register requested for a generated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Friendly,
    Formal,
    Casual,
}

impl Tone {
    pub const ALL: [Tone; 4] = [Tone::Professional, Tone::Friendly, Tone::Formal, Tone::Casual];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Professional => "professional",
            Self::Friendly => "friendly",
            Self::Formal => "formal",
            Self::Casual => "casual",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "professional" => Ok(Self::Professional),
            "friendly" => Ok(Self::Friendly),
            "formal" => Ok(Self::Formal),
            "casual" => Ok(Self::Casual),
            other => Err(format!("unknown tone: '{other}'")),
        }
    }
}

// ── Results ─────────────────────────────────────────────────────────

/// Which path produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationSource {
    Model,
    Rule,
}

impl ClassificationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Rule => "rule",
        }
    }
}

/// Category, priority and explanation for one email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// A configured category name or the reserved fallback.
    pub category: String,
    pub priority: Priority,
    /// In `[0, 1]`.
    pub confidence: f32,
    /// Human-readable explanation of the decision.
    pub reasoning: String,
    pub source: ClassificationSource,
}

/// Which path produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Model,
    Template,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Template => "template",
        }
    }
}

/// Reply text plus provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedResponse {
    pub text: String,
    pub source: ResponseSource,
}
