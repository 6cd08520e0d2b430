//! Unified console error model and mapping helpers.
//! Every gateway, session, pipeline and registry operation reports failures as a
//! `ConsoleError`; views decide what to render from the variant alone.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsoleError {
    /// Transport-level failure: the request never completed.
    #[error("network: {message}")]
    Network { message: String },
    /// 401 or an unusable credential. Handled centrally by the session.
    #[error("auth: {message}")]
    Auth { status: u16, message: String },
    /// 4xx other than auth/not-found, or a client-side check that failed before any call.
    #[error("validation: {message}")]
    Validation { status: Option<u16>, message: String },
    #[error("not_found: {message}")]
    NotFound { message: String },
    /// Decode/replay referenced an absent, unknown or expired scan token.
    #[error("invalid_token: {message}")]
    InvalidToken { message: String },
    #[error("server: {message}")]
    Server { status: u16, message: String },
    /// The current identity lacks the capability; raised before any call is issued.
    #[error("forbidden: {message}")]
    Forbidden { message: String },
    /// A success response whose body could not be read as the expected shape.
    #[error("malformed: {message}")]
    Malformed { message: String },
    #[error("cancelled")]
    Cancelled,
}

impl ConsoleError {
    pub fn code_str(&self) -> &'static str {
        match self {
            ConsoleError::Network { .. } => "network",
            ConsoleError::Auth { .. } => "auth",
            ConsoleError::Validation { .. } => "validation",
            ConsoleError::NotFound { .. } => "not_found",
            ConsoleError::InvalidToken { .. } => "invalid_token",
            ConsoleError::Server { .. } => "server",
            ConsoleError::Forbidden { .. } => "forbidden",
            ConsoleError::Malformed { .. } => "malformed",
            ConsoleError::Cancelled => "cancelled",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ConsoleError::Network { message }
            | ConsoleError::Auth { message, .. }
            | ConsoleError::Validation { message, .. }
            | ConsoleError::NotFound { message }
            | ConsoleError::InvalidToken { message }
            | ConsoleError::Server { message, .. }
            | ConsoleError::Forbidden { message }
            | ConsoleError::Malformed { message } => message.as_str(),
            ConsoleError::Cancelled => "cancelled",
        }
    }

    pub fn network<S: Into<String>>(msg: S) -> Self { ConsoleError::Network { message: msg.into() } }
    pub fn invalid<S: Into<String>>(msg: S) -> Self { ConsoleError::Validation { status: None, message: msg.into() } }
    pub fn not_found<S: Into<String>>(msg: S) -> Self { ConsoleError::NotFound { message: msg.into() } }
    pub fn invalid_token<S: Into<String>>(msg: S) -> Self { ConsoleError::InvalidToken { message: msg.into() } }
    pub fn forbidden<S: Into<String>>(msg: S) -> Self { ConsoleError::Forbidden { message: msg.into() } }
    pub fn malformed<S: Into<String>>(msg: S) -> Self { ConsoleError::Malformed { message: msg.into() } }

    /// Map a non-2xx response into the taxonomy. `label` names the operation and is
    /// only used when the backend sent no body text.
    pub fn from_status(status: u16, body: &str, label: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() { format!("{} failed: {}", label, status) } else { body.to_string() };
        match status {
            401 => ConsoleError::Auth { status, message },
            404 => ConsoleError::NotFound { message },
            400..=499 => ConsoleError::Validation { status: Some(status), message },
            _ => ConsoleError::Server { status, message },
        }
    }

    /// HTTP status this error came from, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ConsoleError::Auth { status, .. } | ConsoleError::Server { status, .. } => Some(*status),
            ConsoleError::Validation { status, .. } => *status,
            ConsoleError::NotFound { .. } | ConsoleError::InvalidToken { .. } => Some(404),
            _ => None,
        }
    }

    /// Silent errors are never rendered next to a form: cancellations are dropped
    /// and auth failures are owned by the session.
    pub fn is_silent(&self) -> bool {
        matches!(self, ConsoleError::Cancelled | ConsoleError::Auth { .. })
    }
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;

impl From<anyhow::Error> for ConsoleError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: plumbing failures surface as malformed unless mapped elsewhere
        ConsoleError::Malformed { message: format!("{:#}", err) }
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        ConsoleError::Malformed { message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
