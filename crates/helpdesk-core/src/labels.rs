//! The static label taxonomy and the idempotent seeding routine.

use crate::composer::{AI_TRIAGED_LABEL, CONFLICT_LABEL};
use crate::tracker::IssueTracker;
use helpdesk_proto::{Category, CategoryProfile, Severity};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelSpec {
    pub name: String,
    pub color: &'static str,
    pub description: &'static str,
}

impl LabelSpec {
    fn new(name: impl Into<String>, color: &'static str, description: &'static str) -> Self {
        Self {
            name: name.into(),
            color,
            description,
        }
    }
}

fn category_style(category: Category) -> (&'static str, &'static str) {
    match category {
        Category::Bug => ("d73a4a", "A defect or error"),
        Category::Usage => ("0075ca", "How-to / usage question"),
        Category::FeatureRequest => ("a2eeef", "New capability or enhancement"),
        Category::Billing => ("fbca04", "Billing / payments"),
        Category::Question => ("d4c5f9", "General question"),
        Category::Other => ("ededed", "Doesn't fit other categories"),
        Category::ApiError => ("d73a4a", "API request failing or returning errors"),
        Category::RateLimit => ("e4e669", "Rate limits, quotas and throttling"),
        Category::Integration => ("1d76db", "SDKs, libraries and integration code"),
    }
}

fn severity_style(severity: Severity) -> (&'static str, &'static str) {
    match severity {
        Severity::Low => ("c2e0c6", "Minor impact"),
        Severity::Medium => ("fef2c0", "Moderate impact"),
        Severity::High => ("f9d0c4", "High impact"),
        Severity::Critical => ("b60205", "Critical impact / outage"),
    }
}

/// Every label the composer can emit for the given profile.
pub fn label_taxonomy(profile: CategoryProfile) -> Vec<LabelSpec> {
    let types = profile.categories().iter().map(|&c| {
        let (color, description) = category_style(c);
        LabelSpec::new(format!("type/{c}"), color, description)
    });
    let severities = Severity::ALL.into_iter().map(|s| {
        let (color, description) = severity_style(s);
        LabelSpec::new(format!("severity/{s}"), color, description)
    });
    types
        .chain(severities)
        .chain([
            LabelSpec::new(AI_TRIAGED_LABEL, "5319e7", "Auto-triaged by AI"),
            LabelSpec::new(CONFLICT_LABEL, "e99695", "User vs AI triage mismatch"),
        ])
        .collect()
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    /// Label name and error text.
    pub failed: Vec<(String, String)>,
}

impl SeedReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Upserts each label in turn. A failure is recorded and seeding moves on.
pub async fn seed_labels(tracker: &dyn IssueTracker, labels: &[LabelSpec]) -> SeedReport {
    let mut report = SeedReport::default();
    info!(target = %tracker.describe(), count = labels.len(), "seeding labels");

    for label in labels {
        let outcome = match tracker.get_label(&label.name).await {
            Ok(()) => tracker.update_label(label).await.map(|()| false),
            Err(e) if e.is_not_found() => tracker.create_label(label).await.map(|()| true),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(true) => report.created.push(label.name.clone()),
            Ok(false) => report.updated.push(label.name.clone()),
            Err(e) => {
                warn!(label = %label.name, error = %e, "label upsert failed");
                report.failed.push((label.name.clone(), e.to_string()));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingTracker;

    #[test]
    fn test_support_taxonomy_matches_composer_labels() {
        let labels = label_taxonomy(CategoryProfile::Support);
        let names: Vec<&str> = labels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names.len(), 12);
        assert!(names.contains(&"type/feature_request"));
        assert!(names.contains(&"severity/critical"));
        assert!(names.contains(&"ai-triaged"));
        assert!(names.contains(&"triage/conflict"));
        let bug = labels.iter().find(|l| l.name == "type/bug").unwrap();
        assert_eq!(bug.color, "d73a4a");
    }

    #[test]
    fn test_api_taxonomy_uses_api_categories() {
        let labels = label_taxonomy(CategoryProfile::Api);
        assert!(labels.iter().any(|l| l.name == "type/rate_limit"));
        assert!(!labels.iter().any(|l| l.name == "type/bug"));
    }

    #[tokio::test]
    async fn test_seed_updates_existing_and_creates_missing() {
        let tracker = RecordingTracker::new().with_existing_labels(["type/bug"]);
        let labels = vec![
            LabelSpec::new("type/bug", "d73a4a", "A defect or error"),
            LabelSpec::new("ai-triaged", "5319e7", "Auto-triaged by AI"),
        ];
        let report = seed_labels(&tracker, &labels).await;
        assert_eq!(report.updated, ["type/bug"]);
        assert_eq!(report.created, ["ai-triaged"]);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_seed_continues_after_failure() {
        let tracker = RecordingTracker::new().failing_label("severity/low");
        let labels = vec![
            LabelSpec::new("severity/low", "c2e0c6", "Minor impact"),
            LabelSpec::new("severity/high", "f9d0c4", "High impact"),
        ];
        let report = seed_labels(&tracker, &labels).await;
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.created, ["severity/high"]);
    }
}
