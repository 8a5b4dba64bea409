use exam_core::model::{Cursor, SubjectBlock};

/// Overall progress through an exam, for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExamProgress {
    /// Percentage in `0.0..=100.0`, by position rather than answered count.
    pub percent: f64,
    /// Index of the subject the cursor is on.
    pub subject_index: usize,
    /// Number of subjects in the session.
    pub subject_count: usize,
    /// Index of the question within the current subject.
    pub question_index: usize,
    /// Number of questions in the current subject.
    pub questions_in_subject: usize,
    /// Answered questions across the whole session.
    pub answered: usize,
    /// Total questions across the whole session.
    pub total_questions: usize,
}

impl ExamProgress {
    /// Each subject owns an equal slice of the bar regardless of how many
    /// questions it holds; position within the subject fills that slice.
    #[must_use]
    pub(crate) fn compute(subjects: &[SubjectBlock], cursor: Cursor, answered: usize) -> Self {
        let subject_count = subjects.len();
        let questions_in_subject = subjects.get(cursor.subject).map_or(0, SubjectBlock::len);
        let total_questions = subjects.iter().map(SubjectBlock::len).sum();

        let percent = if subject_count == 0 {
            0.0
        } else {
            let per_subject = 100.0 / subject_count as f64;
            let within = if questions_in_subject == 0 {
                0.0
            } else {
                cursor.question as f64 / questions_in_subject as f64
            };
            cursor.subject as f64 * per_subject + within * per_subject
        };

        Self {
            percent,
            subject_index: cursor.subject,
            subject_count,
            question_index: cursor.question,
            questions_in_subject,
            answered,
            total_questions,
        }
    }
}
