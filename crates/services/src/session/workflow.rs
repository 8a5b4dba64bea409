use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use exam_core::Clock;
use exam_core::model::{QuestionId, StudentId, Subject, SubjectId};
use storage::repository::SessionStore;

use crate::api::{ExamApi, SubmissionReceipt};
use crate::error::{ExamFlowError, SessionError};
use super::engine::{AdvanceOutcome, ExamSession, SessionPhase};

/// How long the subject-complete acknowledgment stays on screen before the
/// next subject begins. Callers own the actual waiting.
pub const SUBJECT_BREAK_DELAY: Duration = Duration::from_secs(3);

/// How long the result screen stays up after submission before returning
/// home. Callers own the actual waiting.
pub const HOME_REDIRECT_DELAY: Duration = Duration::from_secs(6);

/// Result of opening an exam session.
#[derive(Debug)]
pub struct ExamStart {
    pub session: ExamSession,
    /// True when the session was rebuilt from persisted state instead of a
    /// fresh fetch.
    pub resumed: bool,
    /// Set when a resumed session's subject list differs from the one the
    /// caller asked for. Persisted state wins; the caller should adopt this
    /// list (the original corrects its URL the same one-way direction).
    pub corrected_subject_ids: Option<Vec<SubjectId>>,
}

/// Result of advancing past the current question.
#[derive(Debug, Clone, PartialEq)]
pub enum ExamStep {
    NextQuestion,
    /// A non-final subject just finished. Show the acknowledgment for
    /// `pause`, then apply `finish_subject_break`.
    SubjectBreak {
        completed_subject: String,
        pause: Duration,
    },
    /// Advancing past the last question goes straight to submission; there
    /// is no confirmation step in between.
    Submitted(ExamOutcome),
}

/// Result of a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamOutcome {
    pub receipt: SubmissionReceipt,
    /// How long to show the result before redirecting home.
    pub redirect_after: Duration,
}

/// Orchestrates the exam session: fetch, resume, persist-on-change, submit.
///
/// Every mutation goes through this service so the persisted state never
/// lags the in-memory session by more than the call in flight.
#[derive(Clone)]
pub struct ExamFlowService {
    clock: Clock,
    api: Arc<dyn ExamApi>,
    store: Arc<dyn SessionStore>,
}

impl ExamFlowService {
    #[must_use]
    pub fn new(clock: Clock, api: Arc<dyn ExamApi>, store: Arc<dyn SessionStore>) -> Self {
        Self { clock, api, store }
    }

    /// Open an exam session for the student.
    ///
    /// Persisted state always wins over `requested_subject_ids`: an
    /// interrupted exam resumes where it stopped even when the caller asks
    /// for a different subject list. Only when no state exists are questions
    /// fetched for the requested subjects.
    ///
    /// # Errors
    ///
    /// Returns `ExamFlowError` when the store or the question provider
    /// fails. A fetch failure leaves no persisted state behind.
    pub async fn start(
        &self,
        student: StudentId,
        requested_subject_ids: &[SubjectId],
    ) -> Result<ExamStart, ExamFlowError> {
        if let Some(snapshot) = self.store.load(student).await? {
            let session = ExamSession::resume(student, snapshot);
            let corrected = (session.subject_ids() != requested_subject_ids)
                .then(|| session.subject_ids().to_vec());
            if corrected.is_some() {
                warn!(
                    student = %student,
                    "resumed session overrides the requested subject list"
                );
            }
            info!(student = %student, cursor = ?session.cursor(), "resumed exam session");
            return Ok(ExamStart {
                session,
                resumed: true,
                corrected_subject_ids: corrected,
            });
        }

        let blocks = if requested_subject_ids.is_empty() {
            Vec::new()
        } else {
            self.api
                .fetch_questions(requested_subject_ids, student)
                .await?
        };
        let session = ExamSession::start(student, requested_subject_ids.to_vec(), blocks);
        info!(
            student = %student,
            subjects = session.subjects().len(),
            questions = session.total_questions(),
            "started exam session"
        );
        self.persist(&session).await?;
        Ok(ExamStart {
            session,
            resumed: false,
            corrected_subject_ids: None,
        })
    }

    /// Record an answer and persist the session.
    ///
    /// # Errors
    ///
    /// Returns `ExamFlowError` when the session refuses the answer or the
    /// store fails.
    pub async fn record_answer(
        &self,
        session: &mut ExamSession,
        question_id: QuestionId,
        option_label: impl Into<String>,
    ) -> Result<(), ExamFlowError> {
        session.record_answer(question_id, option_label)?;
        self.persist(session).await
    }

    /// Step past the current question and persist the new position.
    ///
    /// Advancing past the final question submits the exam immediately; a
    /// failed submission (including an empty answer sheet) leaves the
    /// session on the last question, ready to advance again.
    ///
    /// # Errors
    ///
    /// Returns `ExamFlowError` when navigation is refused, submission
    /// fails, or the store fails.
    pub async fn advance(&self, session: &mut ExamSession) -> Result<ExamStep, ExamFlowError> {
        match session.advance()? {
            AdvanceOutcome::NextQuestion => {
                self.persist(session).await?;
                Ok(ExamStep::NextQuestion)
            }
            AdvanceOutcome::SubjectComplete => {
                let completed = session
                    .current_subject()
                    .map(|subject| subject.name().to_owned())
                    .unwrap_or_default();
                debug!(subject = %completed, "subject complete");
                self.persist(session).await?;
                Ok(ExamStep::SubjectBreak {
                    completed_subject: completed,
                    pause: SUBJECT_BREAK_DELAY,
                })
            }
            AdvanceOutcome::ExamFinished => Ok(ExamStep::Submitted(self.submit(session).await?)),
        }
    }

    /// Leave the subject break and persist the cursor on the next subject.
    ///
    /// # Errors
    ///
    /// Returns `ExamFlowError` when no break is in progress or the store
    /// fails.
    pub async fn finish_subject_break(
        &self,
        session: &mut ExamSession,
    ) -> Result<(), ExamFlowError> {
        session.finish_subject_break()?;
        self.persist(session).await
    }

    /// Step back one question and persist the new position.
    ///
    /// # Errors
    ///
    /// Returns `ExamFlowError` when the store fails.
    pub async fn retreat(&self, session: &mut ExamSession) -> Result<(), ExamFlowError> {
        session.retreat();
        self.persist(session).await
    }

    /// Jump to a question within the current subject and persist.
    ///
    /// # Errors
    ///
    /// Returns `ExamFlowError` when the index is out of range or the store
    /// fails.
    pub async fn jump_to(
        &self,
        session: &mut ExamSession,
        question_index: usize,
    ) -> Result<(), ExamFlowError> {
        session.jump_to(question_index)?;
        self.persist(session).await
    }

    /// Fetch questions for additional subjects and append them mid-exam.
    /// Returns the number of subject blocks added.
    ///
    /// The session is only touched after the fetch succeeds, so a provider
    /// failure leaves both the session and the persisted state as they were.
    ///
    /// # Errors
    ///
    /// Returns `ExamFlowError::NoSubjectsSelected` for an empty id list, and
    /// `ExamFlowError` for provider, session or store failures.
    pub async fn add_subjects(
        &self,
        session: &mut ExamSession,
        subject_ids: &[SubjectId],
    ) -> Result<usize, ExamFlowError> {
        if subject_ids.is_empty() {
            return Err(ExamFlowError::NoSubjectsSelected);
        }

        let blocks = self
            .api
            .fetch_questions(subject_ids, session.student_id())
            .await?;
        let added = blocks.len();
        info!(
            student = %session.student_id(),
            added,
            "appending subjects to running exam"
        );
        session.append_subjects(subject_ids, blocks)?;
        self.persist(session).await?;
        Ok(added)
    }

    /// List the subjects available for selection, optionally filtered by
    /// class level and board. Subjects in `exclude` (typically the ones the
    /// session already holds) are dropped from the result.
    ///
    /// # Errors
    ///
    /// Returns `ExamFlowError` when the provider fails.
    pub async fn available_subjects(
        &self,
        class_level: Option<u8>,
        board: Option<&str>,
        exclude: &[SubjectId],
    ) -> Result<Vec<Subject>, ExamFlowError> {
        let mut subjects = self.api.available_subjects(class_level, board).await?;
        subjects.retain(|subject| !exclude.contains(&subject.id));
        Ok(subjects)
    }

    /// Submit the answer sheet, complete the session and clear its persisted
    /// state.
    ///
    /// # Errors
    ///
    /// Returns `ExamFlowError::NoAnswers` for an empty sheet, and a session
    /// error during a subject break or after completion; none of these touch
    /// the network, so the grading service never sees a stray or duplicate
    /// sheet. A submission failure leaves the session and its persisted
    /// state intact, ready to retry.
    pub async fn submit(&self, session: &mut ExamSession) -> Result<ExamOutcome, ExamFlowError> {
        match session.phase() {
            SessionPhase::Completed => return Err(SessionError::Completed.into()),
            SessionPhase::SubjectBreak => return Err(SessionError::Paused.into()),
            SessionPhase::Ready => {}
        }
        if session.answers().is_empty() {
            return Err(ExamFlowError::NoAnswers);
        }

        let receipt = self
            .api
            .submit_answers(
                session.student_id(),
                session.subject_ids(),
                session.answers(),
            )
            .await?;
        session.complete(receipt)?;
        self.store.clear(session.student_id()).await?;
        info!(
            student = %session.student_id(),
            score = receipt.score,
            total = receipt.total,
            "exam submitted"
        );
        Ok(ExamOutcome {
            receipt,
            redirect_after: HOME_REDIRECT_DELAY,
        })
    }

    /// Save the session unless it holds no questions. An empty session has
    /// nothing worth resuming and saving it would block a later fresh fetch.
    async fn persist(&self, session: &ExamSession) -> Result<(), ExamFlowError> {
        if session.is_empty() {
            return Ok(());
        }
        self.store
            .save(session.student_id(), &session.snapshot(), self.clock.now())
            .await?;
        Ok(())
    }
}
