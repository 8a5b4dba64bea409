//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;

/// Errors emitted by the exam API client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExamApiError {
    #[error("exam api request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("could not decode exam api response: {0}")]
    Decode(String),
}

/// Errors emitted by `ExamSession` state transitions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("exam has already been submitted")]
    Completed,

    #[error("navigation is paused during the subject break")]
    Paused,

    #[error("no subject break is in progress")]
    NotInBreak,

    #[error("question index {index} is out of range ({len} questions in subject)")]
    QuestionOutOfRange { index: usize, len: usize },
}

/// Errors emitted by `ExamFlowService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExamFlowError {
    /// Submission requires at least one recorded answer; no network call is
    /// made when the sheet is empty.
    #[error("answer at least one question before submitting")]
    NoAnswers,

    /// Adding subjects requires at least one selected identifier.
    #[error("select at least one subject to add")]
    NoSubjectsSelected,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Api(#[from] ExamApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
