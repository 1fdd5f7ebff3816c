//! Error taxonomy for the exam engine and the grading oracle.
//!
//! Oracle errors are defined in `checkride-core` so the evaluation pipeline
//! can classify failures without string matching. They never reach callers of
//! the engine: the pipeline absorbs them into the fallback verdict.

use thiserror::Error;
use uuid::Uuid;

use crate::model::Mode;

/// Errors surfaced to callers of the exam engine.
#[derive(Debug, Error)]
pub enum ExamError {
    /// The session does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    /// The question does not exist in the bank.
    #[error("question not found: {0}")]
    QuestionNotFound(String),

    /// The session belongs to a different examinee.
    #[error("session belongs to a different user")]
    Forbidden,

    /// The session is not in the active state.
    #[error("session is not active")]
    SessionNotActive,

    /// The bank has no questions for the requested mode. Operator-actionable.
    #[error("no questions found for mode {0}")]
    NoQuestionsForMode(Mode),

    /// A storage operation failed. Safe to retry the calling operation.
    #[error("storage operation failed")]
    Persistence(#[source] anyhow::Error),
}

/// Errors that can occur when calling the grading oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The oracle replied with no usable text content.
    #[error("oracle returned empty content")]
    EmptyReply,
}
