// Error types for hubscout.
// Covers input validation, upstream GitHub failures, cache persistence and configuration.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("Unsupported language: '{0}'")]
    InvalidLanguage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Authentication failed: invalid or expired token")]
    Unauthorized,

    #[error("Rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("GitHub API error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Unexpected response shape: {0}")]
    MalformedResponse(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Missing GitHub token (set GITHUB_TOKEN or github.token)")]
    MissingToken,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request was dropped before completing")]
    QueueClosed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`HubError`], for callers that translate
/// failures into user-facing notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidLanguage,
    InvalidInput,
    NotFound,
    Unauthorized,
    RateLimited,
    Upstream,
    MalformedResponse,
    Transport,
    Internal,
}

impl HubError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HubError::InvalidLanguage(_) => ErrorKind::InvalidLanguage,
            HubError::InvalidInput(_) => ErrorKind::InvalidInput,
            HubError::NotFound(_) => ErrorKind::NotFound,
            HubError::Unauthorized => ErrorKind::Unauthorized,
            HubError::RateLimited { .. } => ErrorKind::RateLimited,
            HubError::Upstream { .. } => ErrorKind::Upstream,
            HubError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            HubError::Transport(_) => ErrorKind::Transport,
            HubError::MissingToken
            | HubError::Config(_)
            | HubError::QueueClosed
            | HubError::Json(_)
            | HubError::Io(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status reported by upstream, if the failure carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            HubError::NotFound(_) => Some(404),
            HubError::Unauthorized => Some(401),
            HubError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, HubError>;
