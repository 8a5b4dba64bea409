//! HTTP boundary to the question provider and submission service.
//!
//! The provider has served two response shapes over time for a subject's
//! question set: a wrapped object (`{questions: […], level_counts: {…}}`) and
//! a bare question array. Both are normalized into `SubjectBlock` here so the
//! session engine only ever sees one representation.

use std::collections::BTreeMap;
use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use exam_core::model::{
    AnswerSheet, Question, QuestionId, StudentId, Subject, SubjectBlock, SubjectId, SubmissionId,
};

use crate::error::ExamApiError;

//
// ─── RECEIPT ───────────────────────────────────────────────────────────────────
//

/// Score acknowledgment returned by the submission service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub score: u32,
    pub total: u32,
    pub submission_id: SubmissionId,
}

//
// ─── API CONTRACT ──────────────────────────────────────────────────────────────
//

/// Remote operations the exam session depends on.
///
/// There is deliberately no retry or backoff at this layer: every failure is
/// terminal for that attempt and requires a new user-initiated action.
#[async_trait]
pub trait ExamApi: Send + Sync {
    /// Fetch a randomized question set per subject, scoped to a student so
    /// the provider can hand back the same draw on a repeat request.
    ///
    /// Blocks are returned in the provider's order, which becomes the
    /// session's subject order.
    ///
    /// # Errors
    ///
    /// Returns `ExamApiError` on transport failure, non-success status, or an
    /// undecodable response body.
    async fn fetch_questions(
        &self,
        subject_ids: &[SubjectId],
        student: StudentId,
    ) -> Result<Vec<SubjectBlock>, ExamApiError>;

    /// List the subject catalog, optionally filtered by class level and board.
    ///
    /// # Errors
    ///
    /// Returns `ExamApiError` on transport failure, non-success status, or an
    /// undecodable response body.
    async fn available_subjects(
        &self,
        class_level: Option<u8>,
        board: Option<&str>,
    ) -> Result<Vec<Subject>, ExamApiError>;

    /// Deliver the full answer sheet for grading.
    ///
    /// # Errors
    ///
    /// Returns `ExamApiError` on transport failure, non-success status, or an
    /// undecodable response body.
    async fn submit_answers(
        &self,
        student: StudentId,
        subject_ids: &[SubjectId],
        answers: &AnswerSheet,
    ) -> Result<SubmissionReceipt, ExamApiError>;
}

//
// ─── HTTP CLIENT ───────────────────────────────────────────────────────────────
//

#[derive(Clone, Debug)]
pub struct ExamApiConfig {
    pub base_url: String,
}

impl ExamApiConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Read the backend location from `EXAM_API_BASE_URL`, falling back to
    /// the development default.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = env::var("EXAM_API_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8000".into());
        Self { base_url }
    }
}

/// `reqwest`-backed implementation of the exam backend contract.
#[derive(Clone)]
pub struct HttpExamApi {
    client: Client,
    config: ExamApiConfig,
}

impl HttpExamApi {
    #[must_use]
    pub fn new(config: ExamApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::new(ExamApiConfig::from_env())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Location of the performance report for an accepted submission.
    ///
    /// Retrieving the document is a plain GET; the caller decides whether to
    /// stream it or hand the URL to something else.
    #[must_use]
    pub fn report_url(&self, submission_id: SubmissionId) -> String {
        self.url(&format!("/api/generate_pdf/{submission_id}/"))
    }

    /// Download the performance report document for a submission.
    ///
    /// # Errors
    ///
    /// Returns `ExamApiError` on transport failure or non-success status.
    pub async fn download_report(
        &self,
        submission_id: SubmissionId,
    ) -> Result<Vec<u8>, ExamApiError> {
        let response = self
            .client
            .get(self.report_url(submission_id))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ExamApiError::HttpStatus(response.status()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ExamApi for HttpExamApi {
    async fn fetch_questions(
        &self,
        subject_ids: &[SubjectId],
        student: StudentId,
    ) -> Result<Vec<SubjectBlock>, ExamApiError> {
        let payload = FetchQuestionsRequest {
            subject_ids: subject_ids.iter().map(SubjectId::value).collect(),
            student_id: student.value(),
        };

        debug!(student = %student, subjects = subject_ids.len(), "fetching questions");
        let response = self
            .client
            .post(self.url("/api/get_random_questions/"))
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ExamApiError::HttpStatus(response.status()));
        }

        // `preserve_order` keeps the provider's subject order, which the
        // session adopts as its subject sequence.
        let body: serde_json::Map<String, Value> = response.json().await?;
        let mut blocks = Vec::with_capacity(body.len());
        for (name, value) in body {
            blocks.push(block_from_value(&name, value)?);
        }
        Ok(blocks)
    }

    async fn available_subjects(
        &self,
        class_level: Option<u8>,
        board: Option<&str>,
    ) -> Result<Vec<Subject>, ExamApiError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(level) = class_level {
            query.push(("class_level", level.to_string()));
        }
        if let Some(board) = board {
            query.push(("board", board.to_string()));
        }

        let response = self
            .client
            .get(self.url("/api/subjects/"))
            .query(&query)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ExamApiError::HttpStatus(response.status()));
        }

        let wires: Vec<SubjectWire> = response.json().await?;
        Ok(wires.into_iter().map(SubjectWire::into_subject).collect())
    }

    async fn submit_answers(
        &self,
        student: StudentId,
        subject_ids: &[SubjectId],
        answers: &AnswerSheet,
    ) -> Result<SubmissionReceipt, ExamApiError> {
        let payload = SubmitAnswersRequest {
            student_id: student.value(),
            subject_ids: subject_ids.iter().map(SubjectId::value).collect(),
            answers,
        };

        debug!(student = %student, answered = answers.len(), "submitting answers");
        let response = self
            .client
            .post(self.url("/api/submit_answers/"))
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ExamApiError::HttpStatus(response.status()));
        }

        let wire: SubmitAnswersResponse = response.json().await?;
        Ok(SubmissionReceipt {
            score: wire.score,
            total: wire.total,
            submission_id: SubmissionId::new(wire.submission_id),
        })
    }
}

//
// ─── WIRE TYPES ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
struct FetchQuestionsRequest {
    subject_ids: Vec<u64>,
    student_id: u64,
}

#[derive(Debug, Serialize)]
struct SubmitAnswersRequest<'a> {
    student_id: u64,
    subject_ids: Vec<u64>,
    answers: &'a AnswerSheet,
}

#[derive(Debug, Deserialize)]
struct SubmitAnswersResponse {
    score: u32,
    total: u32,
    submission_id: u64,
}

#[derive(Debug, Deserialize)]
struct QuestionWire {
    id: u64,
    question_text: String,
    #[serde(default)]
    question_image: Option<String>,
    options: BTreeMap<String, String>,
    level: u8,
    #[serde(default)]
    correct_option: Option<String>,
}

impl QuestionWire {
    fn into_question(self) -> Result<Question, ExamApiError> {
        Question::new(
            QuestionId::new(self.id),
            self.question_text,
            self.question_image,
            self.options,
            self.level,
            self.correct_option,
        )
        .map_err(|e| ExamApiError::Decode(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct SubjectWire {
    id: u64,
    name: String,
    #[serde(default)]
    board: Option<String>,
    #[serde(default)]
    class_level: Option<u8>,
    #[serde(default, alias = "image")]
    image_url: Option<String>,
}

impl SubjectWire {
    fn into_subject(self) -> Subject {
        Subject {
            id: SubjectId::new(self.id),
            name: self.name,
            board: self.board,
            class_level: self.class_level,
            image_url: self.image_url,
        }
    }
}

/// Normalize one subject's payload, whichever shape the provider used.
fn block_from_value(name: &str, value: Value) -> Result<SubjectBlock, ExamApiError> {
    let (questions_value, counts_value) = match value {
        Value::Array(_) => (value, None),
        Value::Object(mut map) => {
            let questions = map.remove("questions").ok_or_else(|| {
                ExamApiError::Decode(format!("subject '{name}' has no questions field"))
            })?;
            (questions, map.remove("level_counts"))
        }
        other => {
            return Err(ExamApiError::Decode(format!(
                "unexpected payload for subject '{name}': {other}"
            )));
        }
    };

    let wires: Vec<QuestionWire> =
        serde_json::from_value(questions_value).map_err(|e| ExamApiError::Decode(e.to_string()))?;
    let mut questions = Vec::with_capacity(wires.len());
    for wire in wires {
        questions.push(wire.into_question()?);
    }

    let level_counts = match counts_value {
        Some(Value::Null) | None => BTreeMap::new(),
        Some(value) => parse_level_counts(name, value)?,
    };

    Ok(SubjectBlock::new(name, questions, level_counts))
}

fn parse_level_counts(name: &str, value: Value) -> Result<BTreeMap<u8, u32>, ExamApiError> {
    let Value::Object(map) = value else {
        return Err(ExamApiError::Decode(format!(
            "level_counts for subject '{name}' is not an object"
        )));
    };

    let mut counts = BTreeMap::new();
    for (level, count) in map {
        let level = level.parse::<u8>().map_err(|_| {
            ExamApiError::Decode(format!("invalid level key '{level}' for subject '{name}'"))
        })?;
        let count = count
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| {
                ExamApiError::Decode(format!(
                    "invalid level count for level {level} of subject '{name}'"
                ))
            })?;
        counts.insert(level, count);
    }
    Ok(counts)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
