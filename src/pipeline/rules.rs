//! Deterministic keyword classifier, the fallback when no model answers.
//!
//! 1. Normalize (lower-case, typographic apostrophes folded) and tokenize
//! 2. Score every category by keyword hits, repeats counted
//! 3. Pick the best score; ties go to the higher `priority_weight`, then to
//!    the earlier definition
//! 4. Priority = max(category floor, urgency scan)
//!
//! Never fails and never consults anything mutable, so the same text always
//! yields the same result.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::pipeline::catalog::{CategoryCatalog, CompiledCategory, FALLBACK_CATEGORY};
use crate::pipeline::types::{ClassificationResult, ClassificationSource, Priority};

/// Keyword-rule classifier over the static catalog.
#[derive(Debug, Clone)]
pub struct KeywordRuleClassifier {
    catalog: Arc<CategoryCatalog>,
}

/// Hits for one category.
struct CategoryScore<'a> {
    category: &'a CompiledCategory,
    matches: Vec<&'a str>,
}

impl CategoryScore<'_> {
    fn score(&self) -> usize {
        self.matches.len()
    }
}

impl KeywordRuleClassifier {
    pub fn new(catalog: Arc<CategoryCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &CategoryCatalog {
        &self.catalog
    }

    /// Classify free text. Always returns a result with `source = rule`.
    pub fn classify(&self, text: &str) -> ClassificationResult {
        let normalized = normalize(text);
        let tokens = tokenize(&normalized);

        if tokens.is_empty() {
            debug!("Empty text, assigning fallback category");
            return ClassificationResult {
                category: FALLBACK_CATEGORY.to_string(),
                priority: Priority::Low,
                confidence: 0.0,
                reasoning: format!(
                    "Classified as {FALLBACK_CATEGORY} with low priority: no content to classify."
                ),
                source: ClassificationSource::Rule,
            };
        }

        let scores: Vec<CategoryScore<'_>> = self
            .catalog
            .categories()
            .iter()
            .map(|category| CategoryScore {
                category,
                matches: category
                    .matchers
                    .iter()
                    .flat_map(|m| m.find_all(&normalized))
                    .collect(),
            })
            .collect();

        let total: usize = scores.iter().map(CategoryScore::score).sum();
        let winner = pick_winner(&scores);

        let (category, floor, matched, confidence) = match winner {
            Some(best) => {
                let definition = &best.category.definition;
                let confidence = if total == 0 {
                    0.0
                } else {
                    (best.score() as f32 / total as f32).clamp(0.0, 1.0)
                };
                (
                    definition.name.clone(),
                    definition.default_priority,
                    unique_in_order(&best.matches),
                    confidence,
                )
            }
            None => (
                FALLBACK_CATEGORY.to_string(),
                self.catalog.fallback_priority(),
                Vec::new(),
                0.0,
            ),
        };

        let urgency = self.catalog.urgency().assess(&normalized);
        let priority = match urgency.level {
            Some(level) => floor.max(level),
            None => floor,
        };

        debug!(
            category = %category,
            priority = %priority,
            tokens = tokens.len(),
            total_hits = total,
            "Keyword rules classified text"
        );

        let reasoning = build_reasoning(&category, floor, priority, &matched, &urgency.terms);

        ClassificationResult {
            category,
            priority,
            confidence,
            reasoning,
            source: ClassificationSource::Rule,
        }
    }
}

/// Highest score wins; ties by weight, then by definition order.
/// `None` when nothing scored.
fn pick_winner<'s, 'a>(scores: &'s [CategoryScore<'a>]) -> Option<&'s CategoryScore<'a>> {
    let mut best: Option<&CategoryScore<'a>> = None;
    for candidate in scores {
        if candidate.score() == 0 {
            continue;
        }
        let better = match best {
            None => true,
            Some(current) => {
                (candidate.score(), candidate.category.definition.priority_weight)
                    > (current.score(), current.category.definition.priority_weight)
            }
        };
        if better {
            best = Some(candidate);
        }
    }
    best
}

fn build_reasoning(
    category: &str,
    floor: Priority,
    priority: Priority,
    matched: &[String],
    urgency_terms: &[String],
) -> String {
    let mut reasoning = if matched.is_empty() {
        format!("Classified as {category}: no category keywords matched (default priority floor: {floor}).")
    } else {
        format!(
            "Classified as {category}: matched keywords {} (default priority floor: {floor}).",
            quote_list(matched)
        )
    };

    if urgency_terms.is_empty() {
        reasoning.push_str(&format!(" No urgency terms found; priority is {priority}."));
    } else if priority > floor {
        reasoning.push_str(&format!(
            " Urgency terms {} raise priority to {priority}.",
            quote_list(urgency_terms)
        ));
    } else {
        reasoning.push_str(&format!(
            " Urgency terms {} found; priority stays {priority}.",
            quote_list(urgency_terms)
        ));
    }
    reasoning
}

fn quote_list(words: &[String]) -> String {
    words
        .iter()
        .map(|w| format!("\"{w}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn unique_in_order(words: &[&str]) -> Vec<String> {
    let mut seen = HashSet::new();
    words
        .iter()
        .filter(|w| seen.insert(**w))
        .map(|w| w.to_string())
        .collect()
}

/// Lower-case and fold typographic apostrophes.
pub fn normalize(text: &str) -> String {
    text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}

/// Split on non-alphanumeric boundaries. Duplicates are kept.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}
