use serde::{Deserialize, Serialize};

/// Pointer to the currently displayed question: (subject index, question index).
///
/// The session engine is responsible for keeping both indexes inside the
/// bounds of the subject sequence and the current subject's question list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub subject: usize,
    pub question: usize,
}

impl Cursor {
    /// Cursor at the first question of the first subject.
    #[must_use]
    pub fn start() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(subject: usize, question: usize) -> Self {
        Self { subject, question }
    }
}
