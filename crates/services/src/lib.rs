#![forbid(unsafe_code)]

pub mod api;
pub mod error;
pub mod session;

pub use exam_core::Clock;

pub use api::{ExamApi, ExamApiConfig, HttpExamApi, SubmissionReceipt};
pub use error::{ExamApiError, ExamFlowError, SessionError};

pub use session::{
    AdvanceOutcome, ExamFlowService, ExamOutcome, ExamProgress, ExamSession, ExamStart, ExamStep,
    SessionPhase, HOME_REDIRECT_DELAY, SUBJECT_BREAK_DELAY,
};
