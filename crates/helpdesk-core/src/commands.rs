//! Chat slash commands: parsing, dispatch and registration payloads.

use crate::composer::TicketDraft;
use crate::desk::SupportDesk;
use helpdesk_proto::{Error, Result, Severity, TriageRecord};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

/// Chat platforms reject longer messages.
pub const MAX_REPLY_CHARS: usize = 1900;

pub const HELP_TEXT: &str = "🤖 Commands: /ping, /help, /status, /doc, /ask, /triage, /ticket";

const OPTION_STRING: u8 = 3;
const OPTION_BOOLEAN: u8 = 5;

/// One `{name, value}` option as delivered by the chat platform.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Help,
    Status,
    Doc,
    Ask {
        question: String,
        private: bool,
    },
    Triage {
        text: String,
    },
    Ticket {
        title: String,
        description: String,
        severity: Option<String>,
        private: bool,
    },
}

fn string_option(options: &[CommandOption], name: &str) -> Option<String> {
    options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn bool_option(options: &[CommandOption], name: &str) -> bool {
    options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_bool())
        .unwrap_or(false)
}

fn required_option(options: &[CommandOption], name: &str) -> Result<String> {
    string_option(options, name).ok_or_else(|| Error::Invalid(format!("option '{name}' is required")))
}

impl Command {
    pub fn parse(name: &str, options: &[CommandOption]) -> Result<Self> {
        Ok(match name {
            "ping" => Command::Ping,
            "help" => Command::Help,
            "status" => Command::Status,
            "doc" => Command::Doc,
            "ask" => Command::Ask {
                question: required_option(options, "q")?,
                private: bool_option(options, "private"),
            },
            "triage" => Command::Triage {
                text: required_option(options, "text")?,
            },
            "ticket" => Command::Ticket {
                title: required_option(options, "title")?,
                description: required_option(options, "description")?,
                severity: string_option(options, "severity"),
                private: bool_option(options, "private"),
            },
            other => return Err(Error::Invalid(format!("unknown command '{other}'"))),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "ping",
            Command::Help => "help",
            Command::Status => "status",
            Command::Doc => "doc",
            Command::Ask { .. } => "ask",
            Command::Triage { .. } => "triage",
            Command::Ticket { .. } => "ticket",
        }
    }

    /// Commands that call collaborators and must be answered asynchronously.
    pub fn is_deferred(&self) -> bool {
        matches!(
            self,
            Command::Ask { .. } | Command::Triage { .. } | Command::Ticket { .. }
        )
    }

    /// Whether the reply is visible only to the invoking user.
    pub fn is_ephemeral(&self) -> bool {
        match self {
            Command::Ask { private, .. } | Command::Ticket { private, .. } => *private,
            Command::Triage { .. } => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub content: String,
    pub ephemeral: bool,
}

impl CommandReply {
    fn new(content: impl Into<String>, ephemeral: bool) -> Self {
        let content: String = content.into();
        Self {
            content: truncate_chars(&content, MAX_REPLY_CHARS),
            ephemeral,
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

/// Chat rendering of a triage record.
pub fn format_triage(record: &TriageRecord) -> String {
    format!(
        "**Summary:** {}\n**Category:** {}\n**Severity:** {}\n**Needs human:** {}\n\n**Suggested reply:**\n{}",
        record.summary,
        record.category,
        record.severity,
        if record.needs_human { "Yes" } else { "No" },
        record.suggested_reply
    )
}

#[derive(Clone)]
pub struct CommandDispatcher {
    desk: Arc<SupportDesk>,
}

impl CommandDispatcher {
    pub fn new(desk: Arc<SupportDesk>) -> Self {
        Self { desk }
    }

    /// Runs a command. Failures become user-visible replies, never errors.
    pub async fn dispatch(&self, command: Command, reporter: &str) -> CommandReply {
        let ephemeral = command.is_ephemeral();
        info!(command = command.name(), reporter, "command received");

        let content = match command {
            Command::Ping => "🏓 Pong!".to_string(),
            Command::Help => HELP_TEXT.to_string(),
            Command::Status => "✅ System is running smoothly!".to_string(),
            Command::Doc => match self.desk.docs_url() {
                Some(url) => format!("📄 Documentation: {url}"),
                None => "📄 Documentation link is not configured (set DOCS_URL).".to_string(),
            },
            Command::Ask { question, .. } => match self.desk.ask(&question).await {
                Ok(answer) => answer,
                Err(e) => {
                    warn!(error = %e, "ask failed");
                    let hint = if self.desk.has_model() {
                        ""
                    } else {
                        " (missing OPENAI_API_KEY?)"
                    };
                    format!("❌ AI error: {e}{hint}")
                }
            },
            Command::Triage { text } => format_triage(&self.desk.triage(&text).await),
            Command::Ticket {
                title,
                description,
                severity,
                ..
            } => {
                let draft = TicketDraft::new(title, description, reporter).with_severity_override(severity);
                match self.desk.open_ticket(&draft).await {
                    Ok(outcome) => format!("✅ Ticket created: {}", outcome.issue.url),
                    Err(e) => {
                        warn!(error = %e, "ticket failed");
                        format!("❌ Ticket failed: {e}")
                    }
                }
            }
        };
        CommandReply::new(content, ephemeral)
    }
}

/// Registration payload for the chat platform's bulk command overwrite.
pub fn command_definitions() -> Value {
    let severity_choices: Vec<Value> = Severity::ALL
        .iter()
        .map(|s| json!({ "name": s.as_str(), "value": s.as_str() }))
        .collect();
    json!([
        { "name": "ping", "description": "Replies with Pong!" },
        { "name": "help", "description": "Lists available commands" },
        { "name": "status", "description": "Shows system status" },
        { "name": "doc", "description": "Get a documentation link" },
        {
            "name": "ask",
            "description": "Ask the AI a support question",
            "options": [
                { "type": OPTION_STRING, "name": "q", "description": "Your question", "required": true },
                { "type": OPTION_BOOLEAN, "name": "private", "description": "Reply only visible to you?" }
            ]
        },
        {
            "name": "triage",
            "description": "Classify text (category, severity, needs-human)",
            "options": [
                { "type": OPTION_STRING, "name": "text", "description": "Content to triage", "required": true }
            ]
        },
        {
            "name": "ticket",
            "description": "Create a GitHub issue",
            "options": [
                { "type": OPTION_STRING, "name": "title", "description": "Issue title", "required": true },
                { "type": OPTION_STRING, "name": "description", "description": "Describe the problem", "required": true },
                { "type": OPTION_STRING, "name": "severity", "description": "Optional severity", "choices": severity_choices },
                { "type": OPTION_BOOLEAN, "name": "private", "description": "Reply only visible to you?" }
            ]
        }
    ])
}
