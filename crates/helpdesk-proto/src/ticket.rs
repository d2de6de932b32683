//! Issue payloads exchanged with the tracker.

use serde::{Deserialize, Serialize};

/// An issue ready to be created. Labels keep insertion order and never repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRequest {
    pub title: String,
    pub body: String,
    labels: Vec<String>,
}

impl IssueRequest {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            labels: Vec::new(),
        }
    }

    /// Appends a label unless it is already present.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.push_label(label);
        self
    }

    pub fn push_label(&mut self, label: impl Into<String>) {
        let label = label.into();
        if !self.labels.contains(&label) {
            self.labels.push(label);
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// What the tracker reports back after creating an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIssue {
    /// The browser URL. GitHub's own `url` field is the API location.
    #[serde(rename(deserialize = "html_url"))]
    pub url: String,
    pub number: u64,
}
