use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::ids::QuestionId;

/// The student's selected option per question across the whole exam.
///
/// Recording is insert-or-overwrite and deliberately does not check the label
/// against the question's declared option set; the submission service is the
/// authority on correctness and ignores unknown labels. Entries are only ever
/// removed by discarding the whole sheet on completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSheet {
    entries: BTreeMap<QuestionId, String>,
}

impl AnswerSheet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or replace the selected option for a question.
    pub fn record(&mut self, question_id: QuestionId, option_label: impl Into<String>) {
        self.entries.insert(question_id, option_label.into());
    }

    /// The label currently selected for a question, if any.
    #[must_use]
    pub fn selected(&self, question_id: QuestionId) -> Option<&str> {
        self.entries.get(&question_id).map(String::as_str)
    }

    #[must_use]
    pub fn is_answered(&self, question_id: QuestionId) -> bool {
        self.entries.contains_key(&question_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionId, &str)> {
        self.entries.iter().map(|(id, label)| (*id, label.as_str()))
    }
}
