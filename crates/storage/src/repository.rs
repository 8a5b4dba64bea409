use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use exam_core::model::{AnswerSheet, Cursor, StudentId, SubjectBlock, SubjectId};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape of one student's in-flight exam session.
///
/// This mirrors the session engine's state so stores can serialize and
/// restore it without leaking storage concerns into the domain layer. The
/// subject-id list must stay in 1:1 fetch order with `subjects`; the engine
/// maintains that invariant and the store only round-trips it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub subjects: Vec<SubjectBlock>,
    #[serde(default)]
    pub answers: AnswerSheet,
    #[serde(default)]
    pub subject_index: usize,
    #[serde(default)]
    pub question_index: usize,
    pub subject_ids: Vec<SubjectId>,
}

impl SessionSnapshot {
    /// The persisted cursor position, defaulting to (0, 0) when the index
    /// entries were missing from the store.
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.subject_index, self.question_index)
    }
}

/// Durable key-value store for exam sessions, namespaced by student.
///
/// Implementations must treat `save` as an idempotent full overwrite of the
/// student's entries: saving an identical snapshot twice leaves the store in
/// the same state as saving it once.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the persisted session for a student, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read or the persisted
    /// payload no longer deserializes.
    async fn load(&self, student: StudentId) -> Result<Option<SessionSnapshot>, StorageError>;

    /// Persist the full session state for a student.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn save(
        &self,
        student: StudentId,
        snapshot: &SessionSnapshot,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Erase every persisted entry for a student.
    ///
    /// Clearing a student with no stored session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete cannot be performed.
    async fn clear(&self, student: StudentId) -> Result<(), StorageError>;
}

/// Simple in-memory store implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<Mutex<HashMap<StudentId, SessionSnapshot>>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, student: StudentId) -> Result<Option<SessionSnapshot>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&student).cloned())
    }

    async fn save(
        &self,
        student: StudentId,
        snapshot: &SessionSnapshot,
        _saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(student, snapshot.clone());
        Ok(())
    }

    async fn clear(&self, student: StudentId) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&student);
        Ok(())
    }
}
