//! In-memory collaborators for tests.
//!
//! Each fake records what it was asked to do so tests can assert on the
//! traffic without any network.

use crate::labels::LabelSpec;
use crate::llm::{CompletionRequest, LlmClient};
use crate::mail::{Mailbox, MailboxMessage, Mailer, OutgoingMail};
use crate::tracker::IssueTracker;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use helpdesk_proto::{CreatedIssue, Error, IssueRequest, Result, Sender};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn not_found(service: &'static str, what: &str) -> Error {
    Error::Status {
        service,
        status: 404,
        body: format!("{what} not found"),
    }
}

enum Scripted {
    Reply(String),
    Fail(String),
}

#[derive(Default)]
struct ScriptState {
    queue: VecDeque<Scripted>,
    requests: Vec<CompletionRequest>,
}

/// Replays queued replies in order. An exhausted script fails the call.
#[derive(Clone, Default)]
pub struct ScriptedLlm {
    state: Arc<Mutex<ScriptState>>,
    delay: Option<Duration>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, content: impl Into<String>) -> Self {
        lock(&self.state).queue.push_back(Scripted::Reply(content.into()));
        self
    }

    pub fn fail(self, message: impl Into<String>) -> Self {
        lock(&self.state).queue.push_back(Scripted::Fail(message.into()));
        self
    }

    /// Every call sleeps this long before answering.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.state).requests.clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let next = {
            let mut state = lock(&self.state);
            state.requests.push(request);
            state.queue.pop_front()
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match next {
            Some(Scripted::Reply(content)) => Ok(content),
            Some(Scripted::Fail(message)) => Err(Error::transport("scripted", message)),
            None => Err(Error::transport("scripted", "script exhausted")),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[derive(Default)]
struct TrackerState {
    issues: Vec<IssueRequest>,
    labels: HashSet<String>,
}

/// Records created issues and keeps an in-memory label set.
#[derive(Default)]
pub struct RecordingTracker {
    state: Mutex<TrackerState>,
    fail_issues: bool,
    failing_labels: HashSet<String>,
}

impl RecordingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every issue creation fails with a 500.
    pub fn failing() -> Self {
        Self {
            fail_issues: true,
            ..Self::default()
        }
    }

    pub fn with_existing_labels<'a>(self, names: impl IntoIterator<Item = &'a str>) -> Self {
        lock(&self.state).labels.extend(names.into_iter().map(str::to_string));
        self
    }

    /// Any operation on this label fails with a 500.
    pub fn failing_label(mut self, name: &str) -> Self {
        self.failing_labels.insert(name.to_string());
        self
    }

    pub fn issues(&self) -> Vec<IssueRequest> {
        lock(&self.state).issues.clone()
    }

    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = lock(&self.state).labels.iter().cloned().collect();
        labels.sort();
        labels
    }

    fn check_label(&self, name: &str) -> Result<()> {
        if self.failing_labels.contains(name) {
            return Err(Error::Status {
                service: "tracker",
                status: 500,
                body: "label store unavailable".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl IssueTracker for RecordingTracker {
    async fn create_issue(&self, issue: &IssueRequest) -> Result<CreatedIssue> {
        if self.fail_issues {
            return Err(Error::Status {
                service: "tracker",
                status: 500,
                body: "tracker unavailable".into(),
            });
        }
        let mut state = lock(&self.state);
        state.issues.push(issue.clone());
        let number = state.issues.len() as u64;
        Ok(CreatedIssue {
            url: format!("https://tracker.test/issues/{number}"),
            number,
        })
    }

    async fn get_label(&self, name: &str) -> Result<()> {
        self.check_label(name)?;
        if lock(&self.state).labels.contains(name) {
            Ok(())
        } else {
            Err(not_found("tracker", name))
        }
    }

    async fn update_label(&self, label: &LabelSpec) -> Result<()> {
        self.check_label(&label.name)
    }

    async fn create_label(&self, label: &LabelSpec) -> Result<()> {
        self.check_label(&label.name)?;
        lock(&self.state).labels.insert(label.name.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "recording tracker".to_string()
    }
}

/// Records outgoing mail, or refuses to send any.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_mail(&self, mail: &OutgoingMail) -> Result<()> {
        if self.fail {
            return Err(Error::transport("mailer", "smtp relay refused"));
        }
        lock(&self.sent).push(mail.clone());
        Ok(())
    }
}

/// A fixed set of plain-text messages.
pub struct StaticMailbox {
    own_address: String,
    messages: Vec<MailboxMessage>,
}

impl StaticMailbox {
    pub fn new(own_address: impl Into<String>) -> Self {
        Self {
            own_address: own_address.into(),
            messages: Vec::new(),
        }
    }

    pub fn with_message(mut self, id: &str, from: &str, subject: &str, body: &str) -> Self {
        self.messages.push(MailboxMessage {
            id: id.to_string(),
            subject: subject.to_string(),
            from: Some(Sender::new(from)),
            body: body.to_string(),
            body_is_html: false,
            received_at: Some(Utc::now()),
        });
        self
    }
}

#[async_trait]
impl Mailbox for StaticMailbox {
    async fn get_message(&self, id: &str) -> Result<MailboxMessage> {
        self.messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| not_found("mailbox", id))
    }

    async fn list_recent(&self, _since: DateTime<Utc>, _top: u32) -> Result<Vec<MailboxMessage>> {
        Ok(self.messages.clone())
    }

    fn own_address(&self) -> &str {
        &self.own_address
    }
}
