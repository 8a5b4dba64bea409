//! The exam session: pure state machine, progress view, and the orchestrating
//! flow service that ties it to the question provider and the session store.

pub mod engine;
pub mod progress;
pub mod workflow;

pub use engine::{AdvanceOutcome, ExamSession, SessionPhase};
pub use progress::ExamProgress;
pub use workflow::{
    ExamFlowService, ExamOutcome, ExamStart, ExamStep, HOME_REDIRECT_DELAY, SUBJECT_BREAK_DELAY,
};
