//! Keyword heuristics used whenever the model's answer is missing or invalid.
//!
//! Rules are plain substring alternations checked against the lower-cased
//! text, in order. The first matching rule wins and every profile ends in a
//! default, so classification is total.

use helpdesk_proto::{Category, CategoryProfile, Severity};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

struct Rule<T> {
    pattern: Regex,
    outcome: T,
}

fn rule<T>(pattern: &str, outcome: T) -> Rule<T> {
    Rule {
        pattern: Regex::new(pattern).expect("classifier pattern must compile"),
        outcome,
    }
}

static SUPPORT_RULES: LazyLock<Vec<Rule<Category>>> = LazyLock::new(|| {
    vec![
        rule(
            "error|exception|stack|500|fail|bug|crash|timeout|broken",
            Category::Bug,
        ),
        rule("price|billing|invoice|charge|payment|refund", Category::Billing),
        rule(
            "feature|request|roadmap|support new|add",
            Category::FeatureRequest,
        ),
        rule("usage|example|tutorial|docs|how|help", Category::Usage),
    ]
});

static API_RULES: LazyLock<Vec<Rule<Category>>> = LazyLock::new(|| {
    vec![
        rule(
            "error|exception|stack|500|fail|crash|timeout|broken|api|scrape",
            Category::ApiError,
        ),
        rule("rate.?limit|429|too.?many|quota|limit", Category::RateLimit),
        rule(
            "price|billing|invoice|charge|payment|refund|subscription",
            Category::Billing,
        ),
        rule(
            "integration|sdk|library|code|example|tutorial|how",
            Category::Integration,
        ),
        rule("usage|docs|help|question", Category::Question),
    ]
});

static SEVERITY_RULES: LazyLock<Vec<Rule<Severity>>> = LazyLock::new(|| {
    vec![
        rule(
            "data loss|security|critical|down|unavailable",
            Severity::Critical,
        ),
        rule("500|blocker|cannot|can't|timeout|crash", Severity::High),
    ]
});

fn first_match<T: Copy>(rules: &[Rule<T>], text: &str) -> Option<T> {
    rules
        .iter()
        .find(|r| r.pattern.is_match(text))
        .map(|r| r.outcome)
}

/// Heuristic category and severity for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub severity: Severity,
}

/// Maps free text to a category and severity without any I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier {
    profile: CategoryProfile,
}

impl KeywordClassifier {
    pub fn new(profile: CategoryProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> CategoryProfile {
        self.profile
    }

    pub fn classify(&self, text: &str) -> Classification {
        let classification = Classification {
            category: self.category_of(text),
            severity: self.severity_of(text),
        };
        debug!(
            profile = %self.profile,
            category = %classification.category,
            severity = %classification.severity,
            "keyword classification"
        );
        classification
    }

    pub fn category_of(&self, text: &str) -> Category {
        let lowered = text.to_lowercase();
        let rules = match self.profile {
            CategoryProfile::Support => &*SUPPORT_RULES,
            CategoryProfile::Api => &*API_RULES,
        };
        first_match(rules, &lowered).unwrap_or(self.profile.fallback_category())
    }

    pub fn severity_of(&self, text: &str) -> Severity {
        let lowered = text.to_lowercase();
        first_match(&SEVERITY_RULES, &lowered).unwrap_or(Severity::Medium)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_support_rules_in_order() {
        let c = KeywordClassifier::new(CategoryProfile::Support);
        assert_eq!(c.category_of("The app crashed"), Category::Bug);
        assert_eq!(c.category_of("Refund my INVOICE"), Category::Billing);
        assert_eq!(c.category_of("Is dark mode on the roadmap?"), Category::FeatureRequest);
        assert_eq!(c.category_of("Where is a tutorial?"), Category::Usage);
        assert_eq!(c.category_of("hello there"), Category::Question);
        // bug outranks billing when both match
        assert_eq!(c.category_of("payment page shows an error"), Category::Bug);
    }

    #[test]
    fn test_api_rules_in_order() {
        let c = KeywordClassifier::new(CategoryProfile::Api);
        assert_eq!(c.category_of("scrape returns nothing"), Category::ApiError);
        assert_eq!(c.category_of("I hit the rate limit"), Category::RateLimit);
        assert_eq!(c.category_of("Too many requests, 429"), Category::RateLimit);
        assert_eq!(c.category_of("cancel my subscription"), Category::Billing);
        assert_eq!(c.category_of("Is there a python sdk"), Category::Integration);
        assert_eq!(c.category_of("quick question"), Category::Question);
        assert_eq!(c.category_of("thanks!"), Category::Other);
    }

    #[test]
    fn test_severity_rules() {
        let c = KeywordClassifier::default();
        assert_eq!(c.severity_of("critical security hole"), Severity::Critical);
        assert_eq!(c.severity_of("site is DOWN"), Severity::Critical);
        assert_eq!(c.severity_of("I can't log in"), Severity::High);
        assert_eq!(c.severity_of("requests timeout"), Severity::High);
        assert_eq!(c.severity_of("got a 500"), Severity::High);
        assert_eq!(c.severity_of("rate limit 429"), Severity::Medium);
        assert_eq!(c.severity_of(""), Severity::Medium);
    }

    #[test]
    fn test_classification_is_total_and_admissible() {
        let samples = ["", "   ", "ümlaut ✓ 🚀", "500", "data loss", "how do I add a key"];
        for profile in [CategoryProfile::Support, CategoryProfile::Api] {
            let c = KeywordClassifier::new(profile);
            for text in samples {
                let result = c.classify(text);
                assert!(profile.admits(result.category), "{profile}: {text:?}");
            }
        }
    }
}
