//! Error types for the proctoring engine.

use thiserror::Error;

/// Errors surfaced by session operations.
///
/// Scoring and policy functions are pure and never fail on valid input;
/// only the I/O-adjacent paths (store, detection, lifecycle) produce these.
#[derive(Debug, Error)]
pub enum ProctorError {
    #[error("Missing session or user identity: {0}")]
    MissingIdentity(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("AI detection error: {0}")]
    Detection(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for ProctorError {
    fn from(e: rusqlite::Error) -> Self {
        ProctorError::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProctorError>;
