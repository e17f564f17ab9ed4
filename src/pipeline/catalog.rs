//! Static category and urgency tables.
//!
//! Built once at startup, validated, then shared read-only (`Arc`) by the
//! rule classifier, the model gateway prompts and template validation.
//!
//! Keyword syntax: a plain keyword or phrase matches whole words only
//! (`down` does not match `download`). A trailing `*` turns it into a
//! prefix match (`urgent*` matches `urgent` and `urgently`).

use std::collections::HashSet;

use regex::Regex;

use crate::error::ConfigError;
use crate::pipeline::types::Priority;

/// Category assigned when no configured keyword matches.
pub const FALLBACK_CATEGORY: &str = "general";

// ── Keyword matching ────────────────────────────────────────────────

/// A single configured keyword compiled to a regex.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keyword: String,
    regex: Regex,
}

impl KeywordMatcher {
    pub fn new(keyword: &str) -> Result<Self, ConfigError> {
        let keyword = keyword.trim();
        let (stem, prefix) = match keyword.strip_suffix('*') {
            Some(stem) => (stem, true),
            None => (keyword, false),
        };
        if stem.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "keyword".into(),
                message: "keywords must not be empty".into(),
            });
        }
        if stem != stem.to_lowercase() {
            return Err(ConfigError::InvalidValue {
                key: "keyword".into(),
                message: format!("keyword '{keyword}' must be lower-case"),
            });
        }

        let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
        let mut pattern = String::new();
        if is_word(stem.chars().next()) {
            pattern.push_str(r"\b");
        }
        pattern.push_str(&regex::escape(stem));
        if prefix {
            pattern.push_str(r"[\w']*");
        } else if is_word(stem.chars().last()) {
            pattern.push_str(r"\b");
        }

        let regex = Regex::new(&pattern).map_err(|e| ConfigError::InvalidValue {
            key: "keyword".into(),
            message: format!("keyword '{keyword}' does not compile: {e}"),
        })?;

        Ok(Self {
            keyword: keyword.to_string(),
            regex,
        })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Every occurrence in `text`, as it appears there. Repeats are
    /// returned once per occurrence.
    pub fn find_all<'t>(&self, text: &'t str) -> impl Iterator<Item = &'t str> {
        self.regex.find_iter(text).map(|m| m.as_str())
    }
}

fn compile_all(keywords: &[String]) -> Result<Vec<KeywordMatcher>, ConfigError> {
    keywords.iter().map(|k| KeywordMatcher::new(k)).collect()
}

// ── Categories ──────────────────────────────────────────────────────

/// A configured category.
#[derive(Debug, Clone)]
pub struct CategoryDefinition {
    /// Unique key, e.g. `billing`.
    pub name: String,
    /// Shown to the model in the classification prompt.
    pub description: String,
    /// Lower-case keywords, see the module docs for syntax.
    pub keywords: Vec<String>,
    /// Tie-break between equal scores; higher wins.
    pub priority_weight: i32,
    /// Floor the rule classifier never goes below for this category.
    pub default_priority: Priority,
}

impl CategoryDefinition {
    pub fn new(
        name: &str,
        description: &str,
        keywords: &[&str],
        priority_weight: i32,
        default_priority: Priority,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            priority_weight,
            default_priority,
        }
    }
}

/// A category with its keywords compiled.
#[derive(Debug, Clone)]
pub struct CompiledCategory {
    pub definition: CategoryDefinition,
    pub matchers: Vec<KeywordMatcher>,
}

// ── Urgency ─────────────────────────────────────────────────────────

/// Urgency indicator terms, scanned independently of the category.
#[derive(Debug, Clone)]
pub struct UrgencyTable {
    high: Vec<KeywordMatcher>,
    medium: Vec<KeywordMatcher>,
}

/// What the urgency scan found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrgencySignal {
    /// Highest tier with at least one hit.
    pub level: Option<Priority>,
    /// Matched words of that tier, in text order.
    pub terms: Vec<String>,
}

impl UrgencyTable {
    pub fn new(high: &[&str], medium: &[&str]) -> Result<Self, ConfigError> {
        let to_owned = |ks: &[&str]| ks.iter().map(|k| k.to_string()).collect::<Vec<_>>();
        Ok(Self {
            high: compile_all(&to_owned(high))?,
            medium: compile_all(&to_owned(medium))?,
        })
    }

    pub fn default_table() -> Result<Self, ConfigError> {
        Self::new(
            &[
                "urgent*",
                "critical*",
                "immediate*",
                "emergency",
                "asap",
                "down",
                "outage*",
                "cannot access",
                "inaccessible",
            ],
            &["help", "support", "issue*", "problem*", "error*", "unable"],
        )
    }

    /// Scan normalized text for urgency terms.
    pub fn assess(&self, text: &str) -> UrgencySignal {
        for (level, matchers) in [(Priority::High, &self.high), (Priority::Medium, &self.medium)] {
            let terms = collect_terms(matchers, text);
            if !terms.is_empty() {
                return UrgencySignal {
                    level: Some(level),
                    terms,
                };
            }
        }
        UrgencySignal {
            level: None,
            terms: Vec::new(),
        }
    }
}

fn collect_terms(matchers: &[KeywordMatcher], text: &str) -> Vec<String> {
    let mut hits: Vec<(usize, &str)> = matchers
        .iter()
        .flat_map(|m| m.regex.find_iter(text).map(|h| (h.start(), h.as_str())))
        .collect();
    hits.sort();
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|(_, word)| seen.insert(*word))
        .map(|(_, word)| word.to_string())
        .collect()
}

// ── Catalog ─────────────────────────────────────────────────────────

/// The full static classification configuration.
#[derive(Debug, Clone)]
pub struct CategoryCatalog {
    categories: Vec<CompiledCategory>,
    urgency: UrgencyTable,
}

impl CategoryCatalog {
    /// Validate and compile a set of definitions. Definition order is kept
    /// and is the final tie-break.
    pub fn new(
        definitions: Vec<CategoryDefinition>,
        urgency: UrgencyTable,
    ) -> Result<Self, ConfigError> {
        let mut names = HashSet::new();
        let mut categories = Vec::with_capacity(definitions.len());

        for definition in definitions {
            let name = definition.name.trim();
            if name.is_empty() {
                return Err(ConfigError::MissingRequired {
                    key: "category.name".into(),
                    hint: "every category needs a name".into(),
                });
            }
            if !names.insert(name.to_string()) {
                return Err(ConfigError::InvalidValue {
                    key: "category.name".into(),
                    message: format!("duplicate category '{name}'"),
                });
            }
            let matchers = compile_all(&definition.keywords)?;
            categories.push(CompiledCategory {
                definition,
                matchers,
            });
        }

        if categories.is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "categories".into(),
                hint: "configure at least one category".into(),
            });
        }

        Ok(Self {
            categories,
            urgency,
        })
    }

    /// The built-in support-desk categories.
    pub fn default_catalog() -> Result<Self, ConfigError> {
        let definitions = vec![
            CategoryDefinition::new(
                "service_outage",
                "Service down, outages, systems unreachable for many users",
                &[
                    "outage*",
                    "down",
                    "downtime",
                    "offline",
                    "unreachable",
                    "inaccessible",
                    "not loading",
                ],
                5,
                Priority::High,
            ),
            CategoryDefinition::new(
                "technical_support",
                "Issues with software, bugs, errors, login problems",
                &[
                    "error*",
                    "bug*",
                    "not working",
                    "broken",
                    "issue*",
                    "problem*",
                    "unable",
                    "cannot",
                    "can't",
                    "reset",
                    "password*",
                    "login",
                    "log in",
                    "access",
                ],
                4,
                Priority::Medium,
            ),
            CategoryDefinition::new(
                "billing",
                "Payment issues, charges, refunds, invoices, pricing questions",
                &[
                    "billing",
                    "charge*",
                    "payment*",
                    "refund*",
                    "invoice*",
                    "cost*",
                    "price",
                    "pricing",
                ],
                3,
                Priority::Medium,
            ),
            CategoryDefinition::new(
                "account",
                "Account verification, access issues, account management",
                &["account*", "verification", "verify", "blocked", "locked out"],
                2,
                Priority::Low,
            ),
            CategoryDefinition::new(
                "integration",
                "API questions, third-party integrations, CRM connections",
                &["api*", "integration*", "crm", "third-party", "webhook*"],
                1,
                Priority::Low,
            ),
            CategoryDefinition::new(
                FALLBACK_CATEGORY,
                "General inquiries, questions not fitting other categories",
                &["help", "support", "question*", "query", "understand"],
                0,
                Priority::Low,
            ),
        ];

        Self::new(definitions, UrgencyTable::default_table()?)
    }

    pub fn categories(&self) -> &[CompiledCategory] {
        &self.categories
    }

    pub fn urgency(&self) -> &UrgencyTable {
        &self.urgency
    }

    pub fn get(&self, name: &str) -> Option<&CategoryDefinition> {
        self.categories
            .iter()
            .map(|c| &c.definition)
            .find(|d| d.name == name)
    }

    /// True for configured names and the reserved fallback.
    pub fn is_known(&self, name: &str) -> bool {
        name == FALLBACK_CATEGORY || self.get(name).is_some()
    }

    /// Configured names followed by the fallback when it is not configured.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .categories
            .iter()
            .map(|c| c.definition.name.as_str())
            .collect();
        if !names.contains(&FALLBACK_CATEGORY) {
            names.push(FALLBACK_CATEGORY);
        }
        names
    }

    /// Priority floor of the fallback category.
    pub fn fallback_priority(&self) -> Priority {
        self.get(FALLBACK_CATEGORY)
            .map(|d| d.default_priority)
            .unwrap_or(Priority::Low)
    }
}
