//! Batch analytics over classification results.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::pipeline::classifier::ClassificationService;
use crate::pipeline::types::{ClassificationResult, ClassificationSource, EmailRecord, Priority};

/// Subject characters shown in a detail row before the ellipsis.
const SUBJECT_PREVIEW_CHARS: usize = 50;

/// One classified email, for tabular display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRow {
    pub sender: String,
    pub subject_preview: String,
    pub category: String,
    pub priority: Priority,
    pub source: ClassificationSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
}

/// Distributions over one batch. Always rebuilt from scratch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total: usize,
    pub categories: BTreeMap<String, usize>,
    /// Every priority level is present, zero when unused.
    pub priorities: BTreeMap<Priority, usize>,
    pub senders: BTreeMap<String, usize>,
    pub sources: BTreeMap<ClassificationSource, usize>,
    /// Input order.
    pub rows: Vec<AnalyticsRow>,
}

impl AnalyticsSummary {
    /// Empty summary with the priority table pre-populated.
    pub fn empty() -> Self {
        Self {
            priorities: Priority::ALL.iter().map(|p| (*p, 0)).collect(),
            ..Self::default()
        }
    }

    fn record(&mut self, email: &EmailRecord, result: &ClassificationResult) {
        self.total += 1;
        *self.categories.entry(result.category.clone()).or_default() += 1;
        *self.priorities.entry(result.priority).or_default() += 1;
        *self.senders.entry(email.sender().to_string()).or_default() += 1;
        *self.sources.entry(result.source).or_default() += 1;
        self.rows.push(AnalyticsRow {
            sender: email.sender().to_string(),
            subject_preview: subject_preview(email.subject()),
            category: result.category.clone(),
            priority: result.priority,
            source: result.source,
            received_at: email.received_at(),
        });
    }
}

/// Classifies a batch and tallies the results. Never generates replies.
pub struct AnalyticsAggregator {
    classifier: Arc<ClassificationService>,
    concurrency: usize,
}

impl AnalyticsAggregator {
    /// `concurrency` of 0 is treated as 1 (sequential).
    pub fn new(classifier: Arc<ClassificationService>, concurrency: usize) -> Self {
        Self {
            classifier,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn summarize(&self, emails: &[EmailRecord]) -> AnalyticsSummary {
        info!(
            emails = emails.len(),
            concurrency = self.concurrency,
            "Summarizing batch"
        );

        let classifier = &self.classifier;
        let mut results: Vec<(usize, ClassificationResult)> =
            futures::stream::iter(emails.iter().enumerate())
                .map(|(idx, email)| async move { (idx, classifier.classify(email).await) })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
        results.sort_by_key(|(idx, _)| *idx);

        let mut summary = AnalyticsSummary::empty();
        for (idx, result) in &results {
            summary.record(&emails[*idx], result);
        }

        info!(
            total = summary.total,
            categories = summary.categories.len(),
            "Batch summarized"
        );
        summary
    }
}

fn subject_preview(subject: &str) -> String {
    let mut chars = subject.chars();
    let head: String = chars.by_ref().take(SUBJECT_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::pipeline::catalog::CategoryCatalog;
    use crate::pipeline::rules::KeywordRuleClassifier;

    fn aggregator(concurrency: usize) -> AnalyticsAggregator {
        let catalog = Arc::new(CategoryCatalog::default_catalog().unwrap());
        let classifier = ClassificationService::new(None, KeywordRuleClassifier::new(catalog));
        AnalyticsAggregator::new(Arc::new(classifier), concurrency)
    }

    fn batch() -> Vec<EmailRecord> {
        vec![
            EmailRecord::new(
                "ops@acme.com",
                "Outage",
                "Our server is down and customers can't log in, please help urgently",
            )
            .unwrap(),
            EmailRecord::new(
                "ap@vendor.com",
                "Invoice question",
                "I was charged twice on my last invoice",
            )
            .unwrap(),
            EmailRecord::new("ap@vendor.com", "Thanks", "Just saying thanks for the demo").unwrap(),
            EmailRecord::new(
                "dev@startup.io",
                "Webhook integration with our CRM keeps failing every few minutes today",
                "The api integration returns an error",
            )
            .unwrap(),
        ]
    }

    #[tokio::test]
    async fn counts_sum_to_total() {
        let emails = batch();
        let summary = aggregator(1).summarize(&emails).await;

        assert_eq!(summary.total, emails.len());
        assert_eq!(summary.categories.values().sum::<usize>(), emails.len());
        assert_eq!(summary.priorities.values().sum::<usize>(), emails.len());
        assert_eq!(summary.senders.values().sum::<usize>(), emails.len());
        assert_eq!(summary.sources.values().sum::<usize>(), emails.len());
        assert_eq!(summary.senders["ap@vendor.com"], 2);
        assert_eq!(summary.categories["billing"], 1);
        assert_eq!(summary.sources[&ClassificationSource::Rule], emails.len());
        assert_eq!(summary.rows.len(), emails.len());
        assert_eq!(summary.rows[0].sender, "ops@acme.com");
    }

    #[tokio::test]
    async fn empty_batch_is_all_zero() {
        let summary = aggregator(4).summarize(&[]).await;
        assert_eq!(summary.total, 0);
        assert!(summary.categories.is_empty());
        assert!(summary.senders.is_empty());
        assert_eq!(summary.priorities.len(), Priority::ALL.len());
        assert!(summary.priorities.values().all(|n| *n == 0));
        assert!(summary.rows.is_empty());
    }

    #[tokio::test]
    async fn order_does_not_change_counts() {
        let emails = batch();
        let mut reversed = emails.clone();
        reversed.reverse();

        let agg = aggregator(3);
        let a = agg.summarize(&emails).await;
        let b = agg.summarize(&reversed).await;

        assert_eq!(a.total, b.total);
        assert_eq!(a.categories, b.categories);
        assert_eq!(a.priorities, b.priorities);
        assert_eq!(a.senders, b.senders);
        assert_eq!(a.sources, b.sources);
    }

    #[tokio::test]
    async fn concurrent_batch_keeps_row_order() {
        let emails = batch();
        let summary = aggregator(4).summarize(&emails).await;
        let senders: Vec<&str> = summary.rows.iter().map(|r| r.sender.as_str()).collect();
        let expected: Vec<&str> = emails.iter().map(|e| e.sender()).collect();
        assert_eq!(senders, expected);
    }

    #[test]
    fn subject_preview_truncates_long_subjects() {
        let long = "a".repeat(60);
        let preview = subject_preview(&long);
        assert_eq!(preview.len(), 53);
        assert!(preview.ends_with("..."));
        assert_eq!(subject_preview("short"), "short");
        assert_eq!(subject_preview(&"b".repeat(50)), "b".repeat(50));
    }
}
