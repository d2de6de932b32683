//! # helpdesk-proto
//!
//! Shared types and error definitions for the helpdesk triage bot.
//!
//! This crate provides the vocabulary every other crate speaks:
//! - Category profiles, categories and severities
//! - The untrusted `TriageCandidate` and the trusted `TriageRecord`
//! - Issue requests handed to the tracker
//! - Inbound email payloads
//! - The common error type

mod email;
mod error;
pub mod ticket;
pub mod triage;

pub use email::{InboundEmail, Sender};
pub use error::{Error, Result};
pub use ticket::{CreatedIssue, IssueRequest};
pub use triage::{Category, CategoryProfile, Severity, TriageCandidate, TriageRecord};
