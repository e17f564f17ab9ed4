//! Classification and reply pipeline.
//!
//! Every email flows through:
//! 1. `ClassificationService::classify()`: model path, falling back to
//!    `KeywordRuleClassifier` on any model failure
//! 2. `ResponseService::generate()`: model draft, falling back to
//!    `TemplateResponder`
//! 3. `AnalyticsAggregator::summarize()`: batch counts over step 1
//!
//! **Both services are total.** A caller always gets a result; the `source`
//! field records which path produced it.

pub mod analytics;
pub mod assistant;
pub mod catalog;
pub mod classifier;
pub mod responder;
pub mod rules;
pub mod templates;
pub mod types;

pub use assistant::{EmailAssistant, TriageOutcome};
