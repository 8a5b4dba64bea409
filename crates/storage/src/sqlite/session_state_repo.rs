use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::Row;

use exam_core::model::StudentId;

use super::SqliteSessionStore;
use crate::repository::{SessionSnapshot, SessionStore, StorageError};

// One row per entry, namespaced by student, so concurrent students can never
// collide in the same store.
const ENTRY_QUESTIONS: &str = "questions";
const ENTRY_ANSWERS: &str = "answers";
const ENTRY_SUBJECT_INDEX: &str = "subject_index";
const ENTRY_QUESTION_INDEX: &str = "question_index";
const ENTRY_SUBJECT_IDS: &str = "subject_ids";

fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn parse_index(entries: &HashMap<String, String>, entry: &str) -> Result<usize, StorageError> {
    match entries.get(entry) {
        None => Ok(0),
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| StorageError::Serialization(format!("invalid {entry}: {raw}"))),
    }
}

#[async_trait::async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, student: StudentId) -> Result<Option<SessionSnapshot>, StorageError> {
        let student_id = id_i64("student_id", student.value())?;

        let rows = sqlx::query(
            r"
                SELECT entry, value
                FROM exam_session_state
                WHERE student_id = ?1
            ",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut entries = HashMap::with_capacity(rows.len());
        for row in rows {
            let entry: String = row.try_get("entry").map_err(ser)?;
            let value: String = row.try_get("value").map_err(ser)?;
            entries.insert(entry, value);
        }

        // A session is only resumable when both the question payload and the
        // original subject-id list survived; anything less is treated as no
        // saved state at all.
        let (Some(questions_json), Some(subject_ids_json)) = (
            entries.get(ENTRY_QUESTIONS),
            entries.get(ENTRY_SUBJECT_IDS),
        ) else {
            return Ok(None);
        };

        let subjects = serde_json::from_str(questions_json).map_err(ser)?;
        let subject_ids = serde_json::from_str(subject_ids_json).map_err(ser)?;
        let answers = match entries.get(ENTRY_ANSWERS) {
            Some(json) => serde_json::from_str(json).map_err(ser)?,
            None => exam_core::model::AnswerSheet::new(),
        };
        let subject_index = parse_index(&entries, ENTRY_SUBJECT_INDEX)?;
        let question_index = parse_index(&entries, ENTRY_QUESTION_INDEX)?;

        Ok(Some(SessionSnapshot {
            subjects,
            answers,
            subject_index,
            question_index,
            subject_ids,
        }))
    }

    async fn save(
        &self,
        student: StudentId,
        snapshot: &SessionSnapshot,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let student_id = id_i64("student_id", student.value())?;

        let entries = [
            (
                ENTRY_QUESTIONS,
                serde_json::to_string(&snapshot.subjects).map_err(ser)?,
            ),
            (
                ENTRY_ANSWERS,
                serde_json::to_string(&snapshot.answers).map_err(ser)?,
            ),
            (ENTRY_SUBJECT_INDEX, snapshot.subject_index.to_string()),
            (ENTRY_QUESTION_INDEX, snapshot.question_index.to_string()),
            (
                ENTRY_SUBJECT_IDS,
                serde_json::to_string(&snapshot.subject_ids).map_err(ser)?,
            ),
        ];

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        for (entry, value) in entries {
            sqlx::query(
                r"
                    INSERT INTO exam_session_state (student_id, entry, value, saved_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT (student_id, entry)
                    DO UPDATE SET value = excluded.value, saved_at = excluded.saved_at
                ",
            )
            .bind(student_id)
            .bind(entry)
            .bind(value)
            .bind(saved_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    async fn clear(&self, student: StudentId) -> Result<(), StorageError> {
        let student_id = id_i64("student_id", student.value())?;

        sqlx::query("DELETE FROM exam_session_state WHERE student_id = ?1")
            .bind(student_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }
}
