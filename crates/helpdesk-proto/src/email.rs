use serde::{Deserialize, Deserializer, Serialize};

/// Who sent an inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sender {
    pub name: Option<String>,
    pub email: String,
}

impl Sender {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// `Name <addr>` when a display name is known, the bare address otherwise.
    pub fn display(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => format!("{name} <{}>", self.email),
            _ => self.email.clone(),
        }
    }
}

// Accepts either `"addr"` or `{"name": .., "email": ..}`.
impl<'de> Deserialize<'de> for Sender {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Address(String),
            Full {
                #[serde(default)]
                name: Option<String>,
                #[serde(default, alias = "address")]
                email: String,
            },
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Address(email) => Sender { name: None, email },
            Raw::Full { name, email } => Sender { name, email },
        })
    }
}

/// A support email as accepted by `/process-email` and produced by the mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEmail {
    #[serde(default)]
    pub from: Option<Sender>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
}

impl InboundEmail {
    /// The plain-text body, falling back to the HTML body.
    pub fn body_text(&self) -> Option<&str> {
        [self.text.as_deref(), self.html.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
    }

    pub fn subject_text(&self) -> &str {
        self.subject.as_deref().unwrap_or_default()
    }
}
