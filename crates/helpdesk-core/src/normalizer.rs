//! Coerces an untrusted model answer into a `TriageRecord`.

use crate::classifier::KeywordClassifier;
use helpdesk_proto::{CategoryProfile, Severity, TriageCandidate, TriageRecord};
use tracing::debug;

/// Reply offered when the model did not produce one.
pub const DEFAULT_SUGGESTED_REPLY: &str = "Thanks for the report! Could you share steps to reproduce, the URL, expected vs actual behavior, and any timestamps or logs?";

/// Summary used when neither the model nor the message provides any text.
pub const FALLBACK_SUMMARY: &str = "User report";

/// Maximum summary length, in characters, when derived from the message.
/// The message is trimmed at both ends before the cut.
pub const SUMMARY_CHARS: usize = 140;

#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    classifier: KeywordClassifier,
}

impl Normalizer {
    pub fn new(profile: CategoryProfile) -> Self {
        Self {
            classifier: KeywordClassifier::new(profile),
        }
    }

    pub fn profile(&self) -> CategoryProfile {
        self.classifier.profile()
    }

    /// Never fails. Each field falls back independently.
    pub fn normalize(
        &self,
        candidate: Option<&TriageCandidate>,
        original_text: &str,
    ) -> TriageRecord {
        let empty = TriageCandidate::default();
        let candidate = candidate.unwrap_or(&empty);
        let profile = self.profile();

        let summary = non_blank(candidate.summary.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| summarize(original_text));

        let category = candidate
            .category
            .as_deref()
            .and_then(|raw| profile.parse_category(raw))
            .unwrap_or_else(|| {
                debug!(raw = ?candidate.category, "category not admissible, using keyword rules");
                self.classifier.category_of(original_text)
            });

        let severity = candidate
            .severity
            .as_deref()
            .and_then(Severity::parse)
            .unwrap_or_else(|| {
                debug!(raw = ?candidate.severity, "severity not admissible, using keyword rules");
                self.classifier.severity_of(original_text)
            });

        let needs_human = candidate
            .needs_human
            .unwrap_or(severity != Severity::Low);

        let suggested_reply = non_blank(candidate.suggested_reply.as_deref())
            .unwrap_or(DEFAULT_SUGGESTED_REPLY)
            .to_string();

        TriageRecord {
            summary,
            category,
            severity,
            needs_human,
            suggested_reply,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn summarize(original_text: &str) -> String {
    let head: String = original_text.trim().chars().take(SUMMARY_CHARS).collect();
    let head = head.trim_end();
    if head.is_empty() {
        FALLBACK_SUMMARY.to_string()
    } else {
        head.to_string()
    }
}
