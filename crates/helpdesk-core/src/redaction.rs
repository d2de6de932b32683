//! Scrubbing of user-supplied text before it is published in a ticket.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::LazyLock;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email pattern")
});
static TOKEN_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(token=)[^&\s]+").expect("token pattern"));
static URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").expect("url pattern"));

const URL_KEEP_CHARS: usize = 80;

/// Whether ticket descriptions are scrubbed before publication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionPolicy {
    #[default]
    Redact,
    PassThrough,
}

impl RedactionPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('-', "_").as_str() {
            "redact" | "on" | "true" => Some(Self::Redact),
            "pass_through" | "passthrough" | "off" | "false" => Some(Self::PassThrough),
            _ => None,
        }
    }

    pub fn apply<'a>(self, text: &'a str) -> Cow<'a, str> {
        match self {
            Self::Redact => Cow::Owned(redact(text)),
            Self::PassThrough => Cow::Borrowed(text),
        }
    }
}

/// Masks email addresses and `token=` query values, and shortens long URLs.
pub fn redact(text: &str) -> String {
    let text = EMAIL.replace_all(text, "[redacted-email]");
    let text = TOKEN_PARAM.replace_all(&text, "${1}[redacted-token]");
    URL.replace_all(&text, |caps: &regex::Captures<'_>| {
        let url = &caps[0];
        if url.chars().count() > URL_KEEP_CHARS {
            let head: String = url.chars().take(URL_KEEP_CHARS).collect();
            format!("{head}…[truncated]")
        } else {
            url.to_string()
        }
    })
    .into_owned()
}
