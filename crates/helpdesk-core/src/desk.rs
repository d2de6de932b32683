//! The support desk: one place that owns every collaborator and runs the
//! triage pipeline for each inbound channel.

use crate::cache::DocsSource;
use crate::composer::{TicketComposer, TicketDraft};
use crate::config::HelpdeskConfig;
use crate::dedup::{ProcessedIdSet, SharedProcessedIds};
use crate::email::{InboundFilter, SkipReason, auto_reply};
use crate::llm::{LlmClient, OpenAiClient};
use crate::mail::{GraphClient, Mailbox, MailboxMessage, Mailer, OutgoingMail};
use crate::normalizer::Normalizer;
use crate::requester::ModelTriageRequester;
use crate::tracker::{GithubTracker, IssueTracker};
use crate::workflow::{RouteOutcome, RouteRequest, WorkflowRouter, WorkflowStatus};
use chrono::Utc;
use helpdesk_proto::{
    CategoryProfile, CreatedIssue, Error, InboundEmail, Result, TriageRecord,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Messages fetched per poll.
pub const POLL_BATCH: u32 = 10;

/// A collaborator, or the env var whose absence disabled it.
type Slot<T> = std::result::Result<Arc<T>, &'static str>;

fn slot<T: ?Sized>(slot: &Slot<T>) -> Result<&Arc<T>> {
    slot.as_ref().map_err(|var| Error::MissingConfig(*var))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Acknowledgement {
    Sent,
    Disabled,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketOutcome {
    pub record: TriageRecord,
    pub issue: CreatedIssue,
    pub routing: RouteOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailOutcome {
    pub record: TriageRecord,
    pub issue: CreatedIssue,
    pub acknowledgement: Acknowledgement,
    pub routing: RouteOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageDisposition {
    Processed(Box<EmailOutcome>),
    Skipped(SkipReason),
    Duplicate,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub fetched: usize,
    pub processed: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub failed: usize,
}

pub struct SupportDesk {
    profile: CategoryProfile,
    product: String,
    docs_url: Option<String>,
    normalizer: Normalizer,
    composer: TicketComposer,
    requester: ModelTriageRequester,
    tracker: Slot<dyn IssueTracker>,
    mailer: Slot<dyn Mailer>,
    mailbox: Slot<dyn Mailbox>,
    docs: Option<DocsSource>,
    workflow: WorkflowRouter,
    processed: SharedProcessedIds,
    acknowledge: bool,
    lookback: Duration,
}

impl SupportDesk {
    /// A desk with no collaborators wired. Use the `with_*` methods to add them.
    pub fn new(profile: CategoryProfile) -> Self {
        Self {
            profile,
            product: "our product".to_string(),
            docs_url: None,
            normalizer: Normalizer::new(profile),
            composer: TicketComposer::default(),
            requester: ModelTriageRequester::new(None, profile),
            tracker: Err("GITHUB_TOKEN"),
            mailer: Err("MICROSOFT_CLIENT_ID"),
            mailbox: Err("MICROSOFT_CLIENT_ID"),
            docs: None,
            workflow: WorkflowRouter::Disabled,
            processed: ProcessedIdSet::shared(crate::dedup::DEFAULT_CAPACITY),
            acknowledge: true,
            lookback: Duration::from_secs(600),
        }
    }

    /// Wires every collaborator whose configuration is complete.
    pub fn from_config(config: &HelpdeskConfig) -> Result<Self> {
        let llm: Option<Arc<dyn LlmClient>> = match OpenAiClient::from_config(&config.model) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!(error = %e, "model triage disabled, keyword heuristics only");
                None
            }
        };

        let mut desk = Self::new(config.profile)
            .with_product(&config.product.name, config.product.docs_url.clone())
            .with_composer(TicketComposer::new(config.redaction))
            .with_llm(llm)
            .with_timeouts(
                Duration::from_secs(config.model.triage_timeout_secs),
                Duration::from_secs(config.model.ask_timeout_secs),
            )
            .with_workflow(WorkflowRouter::from_config(&config.workflow))
            .with_acknowledge(config.mail.acknowledge)
            .with_lookback(Duration::from_secs(config.poll.lookback_secs))
            .with_dedup_capacity(config.poll.dedup_capacity);

        desk.docs = DocsSource::from_config(&config.docs);

        desk.tracker = match config.github.require() {
            Ok(settings) => Ok(Arc::new(GithubTracker::new(&settings)?)),
            Err(Error::MissingConfig(var)) => Err(var),
            Err(e) => return Err(e),
        };

        match config.mail.require() {
            Ok(settings) => {
                let graph = Arc::new(GraphClient::new(settings));
                desk.mailer = Ok(graph.clone());
                desk.mailbox = Ok(graph);
            }
            Err(Error::MissingConfig(var)) => {
                desk.mailer = Err(var);
                desk.mailbox = Err(var);
            }
            Err(e) => return Err(e),
        }

        info!(
            profile = %desk.profile,
            model = desk.requester.is_configured(),
            tracker = desk.tracker.is_ok(),
            mail = desk.mailbox.is_ok(),
            workflow = desk.workflow.is_enabled(),
            "support desk ready"
        );
        Ok(desk)
    }

    pub fn with_product(mut self, name: impl Into<String>, docs_url: Option<String>) -> Self {
        self.product = name.into();
        self.docs_url = docs_url;
        self.requester = self.requester.with_product(self.product.clone());
        self
    }

    pub fn with_composer(mut self, composer: TicketComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn with_llm(mut self, llm: Option<Arc<dyn LlmClient>>) -> Self {
        self.requester = ModelTriageRequester::new(llm, self.profile).with_product(self.product.clone());
        self
    }

    pub fn with_timeouts(mut self, triage: Duration, ask: Duration) -> Self {
        self.requester = self.requester.with_timeouts(triage, ask);
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn IssueTracker>) -> Self {
        self.tracker = Ok(tracker);
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Ok(mailer);
        self
    }

    pub fn with_mailbox(mut self, mailbox: Arc<dyn Mailbox>) -> Self {
        self.mailbox = Ok(mailbox);
        self
    }

    pub fn with_docs(mut self, docs: DocsSource) -> Self {
        self.docs = Some(docs);
        self
    }

    pub fn with_workflow(mut self, workflow: WorkflowRouter) -> Self {
        self.workflow = workflow;
        self
    }

    pub fn with_acknowledge(mut self, acknowledge: bool) -> Self {
        self.acknowledge = acknowledge;
        self
    }

    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn with_dedup_capacity(mut self, capacity: usize) -> Self {
        self.processed = ProcessedIdSet::shared(capacity);
        self
    }

    pub fn profile(&self) -> CategoryProfile {
        self.profile
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn docs_url(&self) -> Option<&str> {
        self.docs_url.as_deref()
    }

    pub fn has_model(&self) -> bool {
        self.requester.is_configured()
    }

    pub fn workflow_status(&self) -> WorkflowStatus {
        self.workflow.status(self.profile)
    }

    pub fn processed_ids(&self) -> SharedProcessedIds {
        Arc::clone(&self.processed)
    }

    /// Model triage with keyword fallback. Always yields a valid record.
    pub async fn triage(&self, text: &str) -> TriageRecord {
        let candidate = self.requester.request_triage(text).await;
        let record = self.normalizer.normalize(candidate.as_ref(), text);
        info!(
            category = %record.category,
            severity = %record.severity,
            needs_human = record.needs_human,
            from_model = candidate.is_some(),
            "message triaged"
        );
        record
    }

    /// Answers a free-form question, enriched with documentation when available.
    pub async fn ask(&self, question: &str) -> Result<String> {
        let docs = match &self.docs {
            Some(source) => source.fetch().await,
            None => None,
        };
        self.requester.ask(question, docs.as_deref()).await
    }

    /// Triages the description and files an issue. Nothing is created on error.
    pub async fn open_ticket(&self, draft: &TicketDraft) -> Result<TicketOutcome> {
        let tracker = slot(&self.tracker)?;
        let record = self.triage(&draft.description).await;
        let issue = self.composer.compose(&record, draft);
        let created = tracker.create_issue(&issue).await?;

        let routing = self
            .workflow
            .route(&RouteRequest {
                ticket_url: created.url.clone(),
                category: record.category,
                severity: record.severity,
                reporter: draft.reporter.clone(),
                subject: draft.title.clone(),
                message: draft.description.clone(),
                source: "chat",
                needs_human: record.needs_human,
            })
            .await;

        Ok(TicketOutcome {
            record,
            issue: created,
            routing,
        })
    }

    /// Files an issue for a support email and acknowledges it.
    pub async fn process_email(&self, email: &InboundEmail) -> Result<EmailOutcome> {
        let sender = email
            .from
            .as_ref()
            .filter(|s| !s.email.trim().is_empty())
            .ok_or_else(|| Error::Invalid("missing sender".into()))?;
        let subject = email
            .subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Invalid("missing subject".into()))?;
        let body = email
            .body_text()
            .ok_or_else(|| Error::Invalid("missing body".into()))?;
        let tracker = slot(&self.tracker)?;

        let record = self.triage(body).await;
        let draft = TicketDraft::new(format!("[Email] {subject}"), body, sender.display());
        let created = tracker.create_issue(&self.composer.compose(&record, &draft)).await?;

        let acknowledgement = self.acknowledge(&sender.email, subject, &record).await;
        let routing = self
            .workflow
            .route(&RouteRequest {
                ticket_url: created.url.clone(),
                category: record.category,
                severity: record.severity,
                reporter: sender.email.clone(),
                subject: subject.to_string(),
                message: body.to_string(),
                source: "email",
                needs_human: record.needs_human,
            })
            .await;

        info!(issue = %created.url, from = %sender.email, "email processed");
        Ok(EmailOutcome {
            record,
            issue: created,
            acknowledgement,
            routing,
        })
    }

    async fn acknowledge(&self, to: &str, subject: &str, record: &TriageRecord) -> Acknowledgement {
        if !self.acknowledge {
            return Acknowledgement::Disabled;
        }
        let mailer = match slot(&self.mailer) {
            Ok(mailer) => mailer,
            Err(e) => {
                debug!(error = %e, "acknowledgement skipped");
                return Acknowledgement::Disabled;
            }
        };
        let mail = OutgoingMail::reply(to, subject, &auto_reply(record.category, &self.product));
        match mailer.send_mail(&mail).await {
            Ok(()) => Acknowledgement::Sent,
            Err(e) => {
                warn!(to = %to, error = %e, "acknowledgement failed, ticket kept");
                Acknowledgement::Failed(e.to_string())
            }
        }
    }

    /// Claims the id in the dedup window. Returns false if it was already seen.
    fn claim(&self, id: &str) -> bool {
        match self.processed.lock() {
            Ok(mut ids) => ids.check_and_mark(id),
            Err(poisoned) => poisoned.into_inner().check_and_mark(id),
        }
    }

    async fn handle_message(&self, message: MailboxMessage, own_address: &str) -> Result<MessageDisposition> {
        if let Some(reason) = InboundFilter::new(own_address).should_skip(&message) {
            debug!(id = %message.id, subject = %message.subject, %reason, "message skipped");
            return Ok(MessageDisposition::Skipped(reason));
        }
        let outcome = self.process_email(&message.to_inbound()).await?;
        Ok(MessageDisposition::Processed(Box::new(outcome)))
    }

    /// Handles one mailbox message announced by a change notification.
    pub async fn process_mailbox_message(&self, id: &str) -> Result<MessageDisposition> {
        let mailbox = slot(&self.mailbox)?;
        if !self.claim(id) {
            debug!(id, "message already processed");
            return Ok(MessageDisposition::Duplicate);
        }
        let message = mailbox.get_message(id).await?;
        self.handle_message(message, mailbox.own_address()).await
    }

    /// Lists recent mail once and processes every unseen message.
    pub async fn poll_once(&self) -> Result<PollReport> {
        let mailbox = slot(&self.mailbox)?;
        let since = Utc::now()
            - chrono::Duration::from_std(self.lookback).unwrap_or(chrono::Duration::minutes(10));
        let messages = mailbox.list_recent(since, POLL_BATCH).await?;

        let mut report = PollReport {
            fetched: messages.len(),
            ..PollReport::default()
        };
        for message in messages {
            if !self.claim(&message.id) {
                report.duplicates += 1;
                continue;
            }
            let id = message.id.clone();
            match self.handle_message(message, mailbox.own_address()).await {
                Ok(MessageDisposition::Processed(_)) => report.processed += 1,
                Ok(MessageDisposition::Skipped(_)) => report.skipped += 1,
                Ok(MessageDisposition::Duplicate) => report.duplicates += 1,
                Err(e) => {
                    error!(id = %id, error = %e, "failed to process message");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}
