use std::fmt;

use exam_core::model::{
    AnswerSheet, Cursor, Question, QuestionId, StudentId, SubjectBlock, SubjectId,
};
use storage::repository::SessionSnapshot;

use crate::api::SubmissionReceipt;
use crate::error::SessionError;
use super::progress::ExamProgress;

//
// ─── PHASES ────────────────────────────────────────────────────────────────────
//

/// Lifecycle phase of one exam attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Questions are on screen and navigation is live.
    Ready,
    /// Transient acknowledgment after finishing a subject. Navigation is
    /// refused until `finish_subject_break` is applied; answers may still be
    /// recorded because recording never moves the cursor.
    SubjectBreak,
    /// The submission service accepted the answer sheet. Terminal.
    Completed,
}

/// What `advance()` decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved to the next question within the current subject.
    NextQuestion,
    /// Last question of a non-final subject: the session entered the subject
    /// break without moving the cursor.
    SubjectComplete,
    /// Nothing left to advance into; the exam is ready to submit. The cursor
    /// is left where it is so a failed submission keeps the session valid.
    ExamFinished,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory state of one exam attempt: the fetched subjects, the answer
/// sheet, and the cursor, plus the phase machine that gates transitions.
///
/// The session is pure and synchronous; fetching, persistence and submission
/// live in `ExamFlowService`. The subject-id list stays in 1:1 fetch order
/// with the subject blocks for the life of the session.
pub struct ExamSession {
    student_id: StudentId,
    subject_ids: Vec<SubjectId>,
    subjects: Vec<SubjectBlock>,
    answers: AnswerSheet,
    cursor: Cursor,
    phase: SessionPhase,
    receipt: Option<SubmissionReceipt>,
}

impl ExamSession {
    /// Open a fresh session over the given blocks, cursor at (0, 0).
    ///
    /// An empty block sequence is legal and represents the "no questions
    /// available" state rather than an error.
    #[must_use]
    pub fn start(
        student_id: StudentId,
        subject_ids: Vec<SubjectId>,
        subjects: Vec<SubjectBlock>,
    ) -> Self {
        Self {
            student_id,
            subject_ids,
            subjects,
            answers: AnswerSheet::new(),
            cursor: Cursor::start(),
            phase: SessionPhase::Ready,
            receipt: None,
        }
    }

    /// Rebuild a session from persisted state.
    ///
    /// The persisted cursor is clamped into bounds; a snapshot saved without
    /// cursor entries resumes at (0, 0).
    #[must_use]
    pub fn resume(student_id: StudentId, snapshot: SessionSnapshot) -> Self {
        let SessionSnapshot {
            subjects,
            answers,
            subject_index,
            question_index,
            subject_ids,
        } = snapshot;

        let cursor = if subjects.is_empty() {
            Cursor::start()
        } else {
            let subject = subject_index.min(subjects.len() - 1);
            let questions = subjects[subject].len();
            let question = question_index.min(questions.saturating_sub(1));
            Cursor::new(subject, question)
        };

        Self {
            student_id,
            subject_ids,
            subjects,
            answers,
            cursor,
            phase: SessionPhase::Ready,
            receipt: None,
        }
    }

    /// The persisted shape of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            subjects: self.subjects.clone(),
            answers: self.answers.clone(),
            subject_index: self.cursor.subject,
            question_index: self.cursor.question,
            subject_ids: self.subject_ids.clone(),
        }
    }

    // ─── Read-only views ───────────────────────────────────────────────────

    #[must_use]
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    /// The subject identifiers this session was built from, in fetch order.
    #[must_use]
    pub fn subject_ids(&self) -> &[SubjectId] {
        &self.subject_ids
    }

    #[must_use]
    pub fn subjects(&self) -> &[SubjectBlock] {
        &self.subjects
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    /// The submission receipt, present once the session is `Completed`.
    #[must_use]
    pub fn receipt(&self) -> Option<SubmissionReceipt> {
        self.receipt
    }

    /// True when no questions were available for the requested subjects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == SessionPhase::Completed
    }

    #[must_use]
    pub fn current_subject(&self) -> Option<&SubjectBlock> {
        self.subjects.get(self.cursor.subject)
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.current_subject()
            .and_then(|subject| subject.question(self.cursor.question))
    }

    /// Total number of questions across all subjects.
    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.subjects.iter().map(SubjectBlock::len).sum()
    }

    #[must_use]
    pub fn is_answered(&self, question_id: QuestionId) -> bool {
        self.answers.is_answered(question_id)
    }

    /// Number of answered questions within the current subject.
    #[must_use]
    pub fn answered_in_current_subject(&self) -> usize {
        self.current_subject().map_or(0, |subject| {
            subject
                .questions()
                .iter()
                .filter(|q| self.answers.is_answered(q.id()))
                .count()
        })
    }

    /// Returns a summary of overall progress for display.
    #[must_use]
    pub fn progress(&self) -> ExamProgress {
        ExamProgress::compute(
            &self.subjects,
            self.cursor,
            self.answers.len(),
        )
    }

    // ─── Mutations ─────────────────────────────────────────────────────────

    /// Record or replace the selected option for a question.
    ///
    /// The label is taken as-is, without checking it against the question's
    /// declared options; the submission service is the grading authority.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` once the exam has been submitted.
    pub fn record_answer(
        &mut self,
        question_id: QuestionId,
        option_label: impl Into<String>,
    ) -> Result<(), SessionError> {
        if self.is_complete() {
            return Err(SessionError::Completed);
        }
        self.answers.record(question_id, option_label);
        Ok(())
    }

    /// Step past the current question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Paused` during a subject break and
    /// `SessionError::Completed` after submission.
    pub fn advance(&mut self) -> Result<AdvanceOutcome, SessionError> {
        match self.phase {
            SessionPhase::Completed => return Err(SessionError::Completed),
            SessionPhase::SubjectBreak => return Err(SessionError::Paused),
            SessionPhase::Ready => {}
        }

        let questions_in_subject = self.current_subject().map_or(0, SubjectBlock::len);
        if self.cursor.question + 1 < questions_in_subject {
            self.cursor.question += 1;
            return Ok(AdvanceOutcome::NextQuestion);
        }
        if self.cursor.subject + 1 < self.subjects.len() {
            self.phase = SessionPhase::SubjectBreak;
            return Ok(AdvanceOutcome::SubjectComplete);
        }
        Ok(AdvanceOutcome::ExamFinished)
    }

    /// Leave the subject break: move to the first question of the next
    /// subject.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInBreak` if no break is in progress.
    pub fn finish_subject_break(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::SubjectBreak {
            return Err(SessionError::NotInBreak);
        }
        self.cursor.subject += 1;
        self.cursor.question = 0;
        self.phase = SessionPhase::Ready;
        Ok(())
    }

    /// Step back one question within the current subject.
    ///
    /// Retreating at question 0 is a no-op: backwards navigation never
    /// crosses a subject boundary, unlike `advance`. Calls during a break or
    /// after completion are ignored rather than queued.
    pub fn retreat(&mut self) {
        if self.phase != SessionPhase::Ready {
            return;
        }
        if self.cursor.question > 0 {
            self.cursor.question -= 1;
        }
    }

    /// Jump directly to a question within the current subject.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::QuestionOutOfRange` for an index outside the
    /// current subject, `SessionError::Paused` during a break, and
    /// `SessionError::Completed` after submission. Out-of-range input is
    /// rejected outright so the cursor can never be left invalid.
    pub fn jump_to(&mut self, question_index: usize) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Completed => return Err(SessionError::Completed),
            SessionPhase::SubjectBreak => return Err(SessionError::Paused),
            SessionPhase::Ready => {}
        }

        let len = self.current_subject().map_or(0, SubjectBlock::len);
        if question_index >= len {
            return Err(SessionError::QuestionOutOfRange {
                index: question_index,
                len,
            });
        }
        self.cursor.question = question_index;
        Ok(())
    }

    /// Append freshly fetched blocks for additional subjects.
    ///
    /// Cursor and answer sheet are untouched; the id list is extended in the
    /// same order the blocks arrive in, preserving the 1:1 correspondence.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Paused` during a break and
    /// `SessionError::Completed` after submission.
    pub fn append_subjects(
        &mut self,
        subject_ids: &[SubjectId],
        blocks: Vec<SubjectBlock>,
    ) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Completed => return Err(SessionError::Completed),
            SessionPhase::SubjectBreak => return Err(SessionError::Paused),
            SessionPhase::Ready => {}
        }

        self.subject_ids.extend_from_slice(subject_ids);
        self.subjects.extend(blocks);
        Ok(())
    }

    /// Mark the session as accepted by the submission service.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` when already complete and
    /// `SessionError::Paused` during a subject break.
    pub fn complete(&mut self, receipt: SubmissionReceipt) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Completed => return Err(SessionError::Completed),
            SessionPhase::SubjectBreak => return Err(SessionError::Paused),
            SessionPhase::Ready => {}
        }
        self.phase = SessionPhase::Completed;
        self.receipt = Some(receipt);
        Ok(())
    }
}

impl fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamSession")
            .field("student_id", &self.student_id)
            .field("subjects_len", &self.subjects.len())
            .field("cursor", &self.cursor)
            .field("answers_len", &self.answers.len())
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
