use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::ids::SubjectId;
use crate::model::question::Question;

/// Catalog entry for a subject, as listed by the subject directory endpoint.
///
/// Used by the add-subjects picker; not part of the per-session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    #[serde(default)]
    pub board: Option<String>,
    #[serde(default)]
    pub class_level: Option<u8>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// One subject's fetched question set plus level metadata.
///
/// Blocks are created when questions arrive from the provider and never
/// mutated afterwards; the session appends whole new blocks instead. The
/// subject name is a display key only and is not guaranteed unique across
/// separate fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectBlock {
    name: String,
    questions: Vec<Question>,
    level_counts: BTreeMap<u8, u32>,
}

impl SubjectBlock {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        questions: Vec<Question>,
        level_counts: BTreeMap<u8, u32>,
    ) -> Self {
        Self {
            name: name.into(),
            questions,
            level_counts,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Question at `index` within this block, if in bounds.
    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Number of questions drawn per difficulty level.
    #[must_use]
    pub fn level_counts(&self) -> &BTreeMap<u8, u32> {
        &self.level_counts
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
