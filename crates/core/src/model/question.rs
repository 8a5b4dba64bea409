use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("a question needs at least two options, got {got}")]
    TooFewOptions { got: usize },

    #[error("question text cannot be empty")]
    EmptyText,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single multiple-choice question as fetched from the question provider.
///
/// Immutable once constructed. `correct_option` is produced by the server for
/// its own bookkeeping and is never consulted by the client; grading happens
/// entirely on the submission service side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    text: String,
    image: Option<String>,
    options: BTreeMap<String, String>,
    level: u8,
    correct_option: Option<String>,
}

impl Question {
    /// Create a question, enforcing that it carries a usable option set.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::TooFewOptions` if fewer than two options are
    /// given, or `QuestionError::EmptyText` for a blank prompt.
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        image: Option<String>,
        options: BTreeMap<String, String>,
        level: u8,
        correct_option: Option<String>,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if options.len() < 2 {
            return Err(QuestionError::TooFewOptions { got: options.len() });
        }

        Ok(Self {
            id,
            text,
            image,
            options,
            level,
            correct_option,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// Labeled answer options, ordered by label.
    #[must_use]
    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// Whether `label` is one of this question's declared options.
    #[must_use]
    pub fn has_option(&self, label: &str) -> bool {
        self.options.contains_key(label)
    }

    /// Difficulty level as assigned by the question bank (1 = easiest).
    #[must_use]
    pub fn level(&self) -> u8 {
        self.level
    }

    #[must_use]
    pub fn correct_option(&self) -> Option<&str> {
        self.correct_option.as_deref()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
