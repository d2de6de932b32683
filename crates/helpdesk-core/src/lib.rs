//! # helpdesk-core
//!
//! Triage pipeline and collaborator clients for the helpdesk bot.
//!
//! This crate provides:
//! - Keyword classification and normalization of model output into a trusted record
//! - The model triage requester with its deadlines and fallbacks
//! - Ticket composition, redaction and label seeding against the issue tracker
//! - Support mailbox handling: filtering, acknowledgements, deduplication and polling
//! - Chat command parsing and dispatch
//! - Configuration loading from YAML and the environment

mod cache;
pub mod classifier;
pub mod commands;
pub mod composer;
mod config;
pub mod dedup;
mod desk;
pub mod email;
pub mod labels;
pub mod llm;
pub mod mail;
pub mod normalizer;
pub mod poller;
pub mod redaction;
pub mod requester;
pub mod testing;
pub mod tracker;
pub mod workflow;

pub use cache::{DocsSource, TtlCache};
pub use classifier::{Classification, KeywordClassifier};
pub use commands::{Command, CommandDispatcher, CommandOption, CommandReply, command_definitions};
pub use composer::{TicketComposer, TicketDraft};
pub use config::{
    ChatConfig, ChatSettings, ConfigError, DocsConfig, EnvCheck, Feature, GithubConfig,
    GithubSettings, GraphSettings, HelpdeskConfig, MailConfig, ModelConfig, PollConfig,
    ProductConfig, ServerConfig, WorkflowConfig,
};
pub use dedup::{ProcessedIdSet, SharedProcessedIds};
pub use desk::{
    Acknowledgement, EmailOutcome, MessageDisposition, POLL_BATCH, PollReport, SupportDesk,
    TicketOutcome,
};
pub use email::{InboundFilter, SkipReason};
pub use labels::{LabelSpec, SeedReport, label_taxonomy, seed_labels};
pub use llm::{LlmClient, OpenAiClient};
pub use mail::{GraphClient, Mailbox, Mailer, Subscription};
pub use normalizer::Normalizer;
pub use poller::run_poller;
pub use redaction::RedactionPolicy;
pub use requester::ModelTriageRequester;
pub use tracker::{GithubTracker, IssueTracker};
pub use workflow::{RouteOutcome, WorkflowRouter, WorkflowStatus};
