//! Error types shared by every collaborator boundary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A required configuration value is absent. Carries the env var name.
    #[error("missing configuration: {0} is not set")]
    MissingConfig(&'static str),

    #[error("{service} request failed: {message}")]
    Transport { service: &'static str, message: String },

    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("could not parse {service} response: {message}")]
    Parse { service: &'static str, message: String },

    #[error("{service} did not answer within {secs}s")]
    Timeout { service: &'static str, secs: u64 },

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn transport(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            service,
            message: err.to_string(),
        }
    }

    pub fn parse(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            service,
            message: err.to_string(),
        }
    }

    /// Returns true when the error is an HTTP 404 from the given service.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
