//! Turns a triage record plus the reporter's own words into an issue.

use crate::redaction::RedactionPolicy;
use helpdesk_proto::{IssueRequest, Severity, TriageRecord};

pub const AI_TRIAGED_LABEL: &str = "ai-triaged";
pub const CONFLICT_LABEL: &str = "triage/conflict";

/// What the reporter supplied alongside the message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketDraft {
    pub title: String,
    pub description: String,
    pub reporter: String,
    /// Severity chosen by the reporter. Values that do not parse are ignored.
    pub severity_override: Option<String>,
}

impl TicketDraft {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        reporter: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            reporter: reporter.into(),
            severity_override: None,
        }
    }

    pub fn with_severity_override(mut self, severity: Option<impl Into<String>>) -> Self {
        self.severity_override = severity.map(Into::into);
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TicketComposer {
    redaction: RedactionPolicy,
}

impl TicketComposer {
    pub fn new(redaction: RedactionPolicy) -> Self {
        Self { redaction }
    }

    pub fn compose(&self, record: &TriageRecord, draft: &TicketDraft) -> IssueRequest {
        let user_severity = draft.severity_override.as_deref().and_then(Severity::parse);
        let severity = user_severity.unwrap_or(record.severity);

        let mut severity_line = format!("**Severity:** {severity}");
        let conflict = user_severity.filter(|s| *s != record.severity);
        if let Some(user) = conflict {
            severity_line.push_str(&format!(" (user: {user}, ai: {})", record.severity));
        }

        let body = format!(
            "**Summary:** {summary}\n\n\
             **Category:** {category}\n\
             {severity_line}\n\
             **Needs human:** {needs_human}\n\n\
             **Reporter:** {reporter}\n\n\
             **User Description:**\n{description}\n\n\
             **Suggested reply:**\n{reply}",
            summary = record.summary,
            category = record.category,
            needs_human = if record.needs_human { "Yes" } else { "No" },
            reporter = draft.reporter,
            description = self.redaction.apply(&draft.description),
            reply = record.suggested_reply,
        );

        let mut issue = IssueRequest::new(draft.title.trim(), body)
            .with_label(format!("type/{}", record.category))
            .with_label(format!("severity/{severity}"))
            .with_label(AI_TRIAGED_LABEL);
        if conflict.is_some() {
            issue.push_label(CONFLICT_LABEL);
        }
        issue
    }
}
