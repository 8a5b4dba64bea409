use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use exam_core::model::{
    AnswerSheet, Cursor, Question, QuestionId, StudentId, Subject, SubjectBlock, SubjectId,
    SubmissionId,
};
use exam_core::time::fixed_clock;
use services::api::{ExamApi, SubmissionReceipt};
use services::error::{ExamApiError, SessionError};
use services::{ExamFlowError, ExamFlowService, ExamStep, SUBJECT_BREAK_DELAY};
use storage::repository::{InMemorySessionStore, SessionStore};

//
// ─── MOCK PROVIDER ─────────────────────────────────────────────────────────────
//

/// Scripted backend: hands out queued fetch responses and counts calls.
struct ScriptedApi {
    fetch_responses: Mutex<Vec<Vec<SubjectBlock>>>,
    fetch_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    fail_next_fetch: AtomicBool,
    submitted_sheet: Mutex<Option<AnswerSheet>>,
    receipt: SubmissionReceipt,
}

impl ScriptedApi {
    fn new(fetch_responses: Vec<Vec<SubjectBlock>>) -> Self {
        Self {
            fetch_responses: Mutex::new(fetch_responses),
            fetch_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            fail_next_fetch: AtomicBool::new(false),
            submitted_sheet: Mutex::new(None),
            receipt: SubmissionReceipt {
                score: 4,
                total: 5,
                submission_id: SubmissionId::new(77),
            },
        }
    }

    fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExamApi for ScriptedApi {
    async fn fetch_questions(
        &self,
        _subject_ids: &[SubjectId],
        _student: StudentId,
    ) -> Result<Vec<SubjectBlock>, ExamApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_fetch.swap(false, Ordering::SeqCst) {
            return Err(ExamApiError::Decode("scripted failure".into()));
        }
        let mut responses = self.fetch_responses.lock().unwrap();
        if responses.is_empty() {
            return Ok(Vec::new());
        }
        Ok(responses.remove(0))
    }

    async fn available_subjects(
        &self,
        _class_level: Option<u8>,
        _board: Option<&str>,
    ) -> Result<Vec<Subject>, ExamApiError> {
        Ok(vec![Subject {
            id: SubjectId::new(10),
            name: "Maths".into(),
            board: None,
            class_level: Some(9),
            image_url: None,
        }])
    }

    async fn submit_answers(
        &self,
        _student: StudentId,
        _subject_ids: &[SubjectId],
        answers: &AnswerSheet,
    ) -> Result<SubmissionReceipt, ExamApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        *self.submitted_sheet.lock().unwrap() = Some(answers.clone());
        Ok(self.receipt)
    }
}

fn question(id: u64) -> Question {
    let options = [("A", "one"), ("B", "two"), ("C", "three"), ("D", "four")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Question::new(QuestionId::new(id), format!("Q{id}"), None, options, 1, None).unwrap()
}

fn block(name: &str, ids: &[u64]) -> SubjectBlock {
    SubjectBlock::new(
        name,
        ids.iter().map(|id| question(*id)).collect(),
        BTreeMap::new(),
    )
}

fn two_subject_fetch() -> Vec<SubjectBlock> {
    vec![block("Maths", &[1, 2]), block("Physics", &[3, 4, 5])]
}

fn service(api: &Arc<ScriptedApi>, store: &Arc<InMemorySessionStore>) -> ExamFlowService {
    ExamFlowService::new(fixed_clock(), api.clone(), store.clone())
}

fn student() -> StudentId {
    StudentId::new(42)
}

fn requested_ids() -> Vec<SubjectId> {
    vec![SubjectId::new(10), SubjectId::new(11)]
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn interrupted_exam_resumes_without_refetching() {
    let api = Arc::new(ScriptedApi::new(vec![two_subject_fetch()]));
    let store = Arc::new(InMemorySessionStore::new());
    let flow = service(&api, &store);

    let mut start = flow.start(student(), &requested_ids()).await.unwrap();
    assert!(!start.resumed);
    assert_eq!(api.fetch_calls(), 1);

    flow.record_answer(&mut start.session, QuestionId::new(1), "B")
        .await
        .unwrap();
    flow.advance(&mut start.session).await.unwrap();
    let interrupted_at = start.session.cursor();
    drop(start);

    // the process died; a new service instance picks the exam back up
    let flow = service(&api, &store);
    let resumed = flow.start(student(), &requested_ids()).await.unwrap();
    assert!(resumed.resumed);
    assert!(resumed.corrected_subject_ids.is_none());
    assert_eq!(api.fetch_calls(), 1);
    assert_eq!(resumed.session.cursor(), interrupted_at);
    assert_eq!(
        resumed.session.answers().selected(QuestionId::new(1)),
        Some("B")
    );
}

#[tokio::test]
async fn resume_overrides_a_different_subject_request() {
    let api = Arc::new(ScriptedApi::new(vec![two_subject_fetch()]));
    let store = Arc::new(InMemorySessionStore::new());
    let flow = service(&api, &store);

    flow.start(student(), &requested_ids()).await.unwrap();

    // the caller now asks for an unrelated subject list
    let resumed = flow.start(student(), &[SubjectId::new(99)]).await.unwrap();
    assert!(resumed.resumed);
    assert_eq!(
        resumed.corrected_subject_ids.as_deref(),
        Some(requested_ids().as_slice())
    );
    assert_eq!(api.fetch_calls(), 1);
}

#[tokio::test]
async fn empty_question_mapping_is_not_an_error_and_not_persisted() {
    let api = Arc::new(ScriptedApi::new(vec![Vec::new()]));
    let store = Arc::new(InMemorySessionStore::new());
    let flow = service(&api, &store);

    let start = flow.start(student(), &requested_ids()).await.unwrap();
    assert!(start.session.is_empty());
    assert!(start.session.current_question().is_none());
    assert!(store.load(student()).await.unwrap().is_none());
}

#[tokio::test]
async fn submit_with_empty_sheet_never_reaches_the_network() {
    let api = Arc::new(ScriptedApi::new(vec![two_subject_fetch()]));
    let store = Arc::new(InMemorySessionStore::new());
    let flow = service(&api, &store);

    let mut start = flow.start(student(), &requested_ids()).await.unwrap();
    let err = flow.submit(&mut start.session).await.unwrap_err();
    assert!(matches!(err, ExamFlowError::NoAnswers));
    assert_eq!(api.submit_calls(), 0);
    assert!(!start.session.is_complete());
}

#[tokio::test]
async fn failed_question_fetch_surfaces_the_error_and_persists_nothing() {
    let api = Arc::new(ScriptedApi::new(vec![two_subject_fetch()]));
    let store = Arc::new(InMemorySessionStore::new());
    let flow = service(&api, &store);

    api.fail_next_fetch.store(true, Ordering::SeqCst);
    let err = flow.start(student(), &requested_ids()).await.unwrap_err();
    assert!(matches!(err, ExamFlowError::Api(_)));

    // nothing was saved, so the next attempt fetches fresh
    assert!(store.load(student()).await.unwrap().is_none());
    let start = flow.start(student(), &requested_ids()).await.unwrap();
    assert!(!start.resumed);
    assert_eq!(start.session.total_questions(), 5);
}

#[tokio::test]
async fn submit_during_subject_break_never_reaches_the_network() {
    let api = Arc::new(ScriptedApi::new(vec![two_subject_fetch()]));
    let store = Arc::new(InMemorySessionStore::new());
    let flow = service(&api, &store);

    let mut start = flow.start(student(), &requested_ids()).await.unwrap();
    let session = &mut start.session;
    flow.record_answer(session, QuestionId::new(1), "A")
        .await
        .unwrap();
    flow.record_answer(session, QuestionId::new(2), "B")
        .await
        .unwrap();
    flow.advance(session).await.unwrap();
    let step = flow.advance(session).await.unwrap();
    assert!(matches!(step, ExamStep::SubjectBreak { .. }));

    // a click landing inside the delay window is ignored, not queued
    let err = flow.submit(session).await.unwrap_err();
    assert!(matches!(
        err,
        ExamFlowError::Session(SessionError::Paused)
    ));
    assert_eq!(api.submit_calls(), 0);
    assert!(!session.is_complete());
}

#[tokio::test]
async fn completed_session_cannot_post_the_sheet_again() {
    let api = Arc::new(ScriptedApi::new(vec![vec![block("Maths", &[1])]]));
    let store = Arc::new(InMemorySessionStore::new());
    let flow = service(&api, &store);

    let mut start = flow
        .start(student(), &[SubjectId::new(10)])
        .await
        .unwrap();
    let session = &mut start.session;
    flow.record_answer(session, QuestionId::new(1), "A")
        .await
        .unwrap();
    let step = flow.advance(session).await.unwrap();
    assert!(matches!(step, ExamStep::Submitted(_)));
    assert_eq!(api.submit_calls(), 1);

    let err = flow.submit(session).await.unwrap_err();
    assert!(matches!(
        err,
        ExamFlowError::Session(SessionError::Completed)
    ));
    assert_eq!(api.submit_calls(), 1);
}

#[tokio::test]
async fn full_exam_walkthrough_submits_and_clears_state() {
    let api = Arc::new(ScriptedApi::new(vec![two_subject_fetch()]));
    let store = Arc::new(InMemorySessionStore::new());
    let flow = service(&api, &store);

    let mut start = flow.start(student(), &requested_ids()).await.unwrap();
    let session = &mut start.session;
    let mut outcome = None;

    for id in 1..=5_u64 {
        let question_id = session.current_question().unwrap().id();
        assert_eq!(question_id, QuestionId::new(id));
        flow.record_answer(session, question_id, "A").await.unwrap();

        match flow.advance(session).await.unwrap() {
            ExamStep::NextQuestion => {}
            ExamStep::SubjectBreak {
                completed_subject,
                pause,
            } => {
                assert_eq!(completed_subject, "Maths");
                assert_eq!(pause, SUBJECT_BREAK_DELAY);
                flow.finish_subject_break(session).await.unwrap();
            }
            ExamStep::Submitted(submitted) => {
                assert_eq!(id, 5);
                outcome = Some(submitted);
            }
        }
    }

    let outcome = outcome.expect("last advance submits");
    assert_eq!(outcome.receipt.score, 4);
    assert_eq!(outcome.receipt.total, 5);
    assert_eq!(outcome.redirect_after, Duration::from_secs(6));
    assert!(session.is_complete());
    assert_eq!(api.submit_calls(), 1);

    // every one of the five answers reached the submission service
    let sheet = api.submitted_sheet.lock().unwrap().clone().unwrap();
    assert_eq!(sheet.len(), 5);

    // a later start must begin fresh, not resume the finished attempt
    assert!(store.load(student()).await.unwrap().is_none());
}

#[tokio::test]
async fn subjects_can_be_added_mid_exam() {
    let api = Arc::new(ScriptedApi::new(vec![
        two_subject_fetch(),
        vec![block("Chemistry", &[6, 7])],
    ]));
    let store = Arc::new(InMemorySessionStore::new());
    let flow = service(&api, &store);

    let mut start = flow.start(student(), &requested_ids()).await.unwrap();
    let session = &mut start.session;
    flow.record_answer(session, QuestionId::new(1), "A")
        .await
        .unwrap();
    flow.advance(session).await.unwrap();
    assert_eq!(session.cursor(), Cursor::new(0, 1));

    let added = flow
        .add_subjects(session, &[SubjectId::new(12)])
        .await
        .unwrap();

    assert_eq!(added, 1);
    assert_eq!(session.subjects().len(), 3);
    assert_eq!(session.cursor(), Cursor::new(0, 1));
    assert_eq!(session.answers().len(), 1);

    // the extended session is what resumes
    let snapshot = store.load(student()).await.unwrap().unwrap();
    assert_eq!(snapshot.subjects.len(), 3);
    assert_eq!(
        snapshot.subject_ids,
        vec![SubjectId::new(10), SubjectId::new(11), SubjectId::new(12)]
    );
}

#[tokio::test]
async fn failed_subject_fetch_leaves_the_session_unchanged() {
    let api = Arc::new(ScriptedApi::new(vec![two_subject_fetch()]));
    let store = Arc::new(InMemorySessionStore::new());
    let flow = service(&api, &store);

    let mut start = flow.start(student(), &requested_ids()).await.unwrap();
    let session = &mut start.session;
    let before = session.snapshot();

    api.fail_next_fetch.store(true, Ordering::SeqCst);
    let err = flow
        .add_subjects(session, &[SubjectId::new(12)])
        .await
        .unwrap_err();
    assert!(matches!(err, ExamFlowError::Api(_)));

    assert_eq!(session.snapshot(), before);
    assert_eq!(store.load(student()).await.unwrap().unwrap(), before);
}

#[tokio::test]
async fn adding_zero_subjects_is_rejected_before_the_network() {
    let api = Arc::new(ScriptedApi::new(vec![two_subject_fetch()]));
    let store = Arc::new(InMemorySessionStore::new());
    let flow = service(&api, &store);

    let mut start = flow.start(student(), &requested_ids()).await.unwrap();
    let fetches_before = api.fetch_calls();

    let err = flow.add_subjects(&mut start.session, &[]).await.unwrap_err();
    assert!(matches!(err, ExamFlowError::NoSubjectsSelected));
    assert_eq!(api.fetch_calls(), fetches_before);
}

#[tokio::test]
async fn subject_picker_hides_already_loaded_subjects() {
    let api = Arc::new(ScriptedApi::new(vec![two_subject_fetch()]));
    let store = Arc::new(InMemorySessionStore::new());
    let flow = service(&api, &store);

    let listed = flow.available_subjects(Some(9), None, &[]).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, SubjectId::new(10));

    let filtered = flow
        .available_subjects(Some(9), None, &[SubjectId::new(10)])
        .await
        .unwrap();
    assert!(filtered.is_empty());
}

#[tokio::test]
async fn navigation_changes_are_persisted_as_they_happen() {
    let api = Arc::new(ScriptedApi::new(vec![two_subject_fetch()]));
    let store = Arc::new(InMemorySessionStore::new());
    let flow = service(&api, &store);

    let mut start = flow.start(student(), &requested_ids()).await.unwrap();
    let session = &mut start.session;

    flow.jump_to(session, 1).await.unwrap();
    assert_eq!(store.load(student()).await.unwrap().unwrap().cursor(), Cursor::new(0, 1));

    flow.retreat(session).await.unwrap();
    assert_eq!(store.load(student()).await.unwrap().unwrap().cursor(), Cursor::new(0, 0));
}
