use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The category taxonomy a deployment classifies into.
///
/// Both profiles share one classifier and one normalizer; the profile only
/// decides which categories are admissible and which heuristic rules apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryProfile {
    /// General product support: bug, question, billing, feature_request, usage, other.
    #[default]
    Support,
    /// API product support: api_error, rate_limit, billing, integration, question, other.
    Api,
}

impl CategoryProfile {
    /// Admissible categories, in the order they are presented to the model.
    pub fn categories(self) -> &'static [Category] {
        match self {
            CategoryProfile::Support => &[
                Category::Bug,
                Category::Question,
                Category::Billing,
                Category::FeatureRequest,
                Category::Usage,
                Category::Other,
            ],
            CategoryProfile::Api => &[
                Category::ApiError,
                Category::RateLimit,
                Category::Billing,
                Category::Integration,
                Category::Question,
                Category::Other,
            ],
        }
    }

    /// Category used by the keyword rules when nothing matches.
    pub fn fallback_category(self) -> Category {
        match self {
            CategoryProfile::Support => Category::Question,
            CategoryProfile::Api => Category::Other,
        }
    }

    pub fn admits(self, category: Category) -> bool {
        self.categories().contains(&category)
    }

    /// Parses a category name and checks it belongs to this profile.
    pub fn parse_category(self, raw: &str) -> Option<Category> {
        Category::parse(raw).filter(|c| self.admits(*c))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CategoryProfile::Support => "support",
            CategoryProfile::Api => "api",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "support" => Some(CategoryProfile::Support),
            "api" => Some(CategoryProfile::Api),
            _ => None,
        }
    }
}

impl fmt::Display for CategoryProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every category known to any profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Bug,
    Question,
    Billing,
    FeatureRequest,
    Usage,
    ApiError,
    RateLimit,
    Integration,
    Other,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Bug => "bug",
            Category::Question => "question",
            Category::Billing => "billing",
            Category::FeatureRequest => "feature_request",
            Category::Usage => "usage",
            Category::ApiError => "api_error",
            Category::RateLimit => "rate_limit",
            Category::Integration => "integration",
            Category::Other => "other",
        }
    }

    /// Case-insensitive parse of a wire name. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_lowercase();
        [
            Category::Bug,
            Category::Question,
            Category::Billing,
            Category::FeatureRequest,
            Category::Usage,
            Category::ApiError,
            Category::RateLimit,
            Category::Integration,
            Category::Other,
        ]
        .into_iter()
        .find(|c| c.as_str() == lowered)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket severity. Ordered from least to most urgent.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Case-insensitive parse. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_lowercase();
        Self::ALL.into_iter().find(|s| s.as_str() == lowered)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a language model claims about a message. Nothing here is trusted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriageCandidate {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default, alias = "needsHuman")]
    pub needs_human: Option<bool>,
    #[serde(default, alias = "suggestedReply")]
    pub suggested_reply: Option<String>,
}

impl TriageCandidate {
    /// Builds a candidate from arbitrary JSON without ever failing.
    ///
    /// Text fields accept strings and stringify numbers and booleans; any
    /// other JSON type counts as absent. `needs_human` survives only when it
    /// is an actual boolean. A non-object value yields an empty candidate.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };
        let text = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| object.get(*k))
                .find_map(scalar_to_string)
        };
        Self {
            summary: text(&["summary"]),
            category: text(&["category"]),
            severity: text(&["severity"]),
            needs_human: ["needs_human", "needsHuman"]
                .iter()
                .filter_map(|k| object.get(*k))
                .find_map(Value::as_bool),
            suggested_reply: text(&["suggested_reply", "suggestedReply"]),
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl From<&TriageRecord> for TriageCandidate {
    fn from(record: &TriageRecord) -> Self {
        Self {
            summary: Some(record.summary.clone()),
            category: Some(record.category.as_str().to_string()),
            severity: Some(record.severity.as_str().to_string()),
            needs_human: Some(record.needs_human),
            suggested_reply: Some(record.suggested_reply.clone()),
        }
    }
}

/// A fully populated triage result. Every field is always valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageRecord {
    pub summary: String,
    pub category: Category,
    pub severity: Severity,
    pub needs_human: bool,
    pub suggested_reply: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profiles_have_six_categories_ending_in_other() {
        for profile in [CategoryProfile::Support, CategoryProfile::Api] {
            let cats = profile.categories();
            assert_eq!(cats.len(), 6);
            assert_eq!(cats.last(), Some(&Category::Other));
            assert!(profile.admits(profile.fallback_category()));
        }
    }

    #[test]
    fn test_parse_category_respects_profile() {
        assert_eq!(
            CategoryProfile::Support.parse_category("Bug"),
            Some(Category::Bug)
        );
        assert_eq!(CategoryProfile::Api.parse_category("bug"), None);
        assert_eq!(
            CategoryProfile::Api.parse_category(" RATE_LIMIT "),
            Some(Category::RateLimit)
        );
        assert_eq!(CategoryProfile::Support.parse_category("feature request"), None);
    }

    #[test]
    fn test_severity_parse_and_order() {
        assert_eq!(Severity::parse("HIGH"), Some(Severity::High));
        assert_eq!(Severity::parse("urgent"), None);
        assert_eq!(Severity::default(), Severity::Medium);
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_category_wire_names() {
        assert_eq!(
            serde_json::to_string(&Category::FeatureRequest).unwrap(),
            "\"feature_request\""
        );
        assert_eq!(Category::ApiError.to_string(), "api_error");
    }

    #[test]
    fn test_candidate_from_value_is_lenient() {
        let value = json!({
            "summary": 42,
            "category": ["bug"],
            "severity": "HIGH",
            "needs_human": "yes",
            "suggested_reply": null
        });
        let candidate = TriageCandidate::from_value(&value);
        assert_eq!(candidate.summary.as_deref(), Some("42"));
        assert_eq!(candidate.category, None);
        assert_eq!(candidate.severity.as_deref(), Some("HIGH"));
        assert_eq!(candidate.needs_human, None);
        assert_eq!(candidate.suggested_reply, None);
    }

    #[test]
    fn test_candidate_from_value_accepts_camel_case() {
        let value = json!({ "needsHuman": false, "suggestedReply": "hi" });
        let candidate = TriageCandidate::from_value(&value);
        assert_eq!(candidate.needs_human, Some(false));
        assert_eq!(candidate.suggested_reply.as_deref(), Some("hi"));
    }

    #[test]
    fn test_candidate_from_non_object_is_empty() {
        assert_eq!(
            TriageCandidate::from_value(&json!("just text")),
            TriageCandidate::default()
        );
        assert_eq!(
            TriageCandidate::from_value(&Value::Null),
            TriageCandidate::default()
        );
    }
}
