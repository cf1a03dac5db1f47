//! One trainee's pass through a chapter's questions.
//!
//! The flow only moves forward: an accepted answer can't be revised, and the
//! session reaches `Finished` only after the submission write is confirmed.

use serde::Serialize;

use crate::scoring::{self, chapter_key};
use crate::store::{NewSubmission, Quiz, QuizStore, StoreError, Submission};

pub const CALLSIGN_REQUIRED: &str = "CALLSIGN REQUIRED";
pub const CHAPTER_REQUIRED: &str = "CHAPTER REQUIRED";
pub const NO_QUESTIONS: &str = "NO QUESTIONS IN CHAPTER";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("option {index} is not one of the {count} options")]
    BadOption { index: i64, count: usize },
    #[error("session is {0}")]
    InvalidState(&'static str),
    #[error("submission write failed: {0}")]
    WriteFailed(#[source] StoreError),
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::Validation(_) => "validation_failed",
            SessionError::BadOption { .. } => "bad_params",
            SessionError::InvalidState(_) => "invalid_state",
            SessionError::WriteFailed(_) => "submission_write_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SessionState {
    NotStarted,
    InProgress,
    #[serde(rename_all = "camelCase")]
    FinalizePending { error: String },
    #[serde(rename_all = "camelCase")]
    Finished { submission: Submission },
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            SessionState::NotStarted => "not started",
            SessionState::InProgress => "in progress",
            SessionState::FinalizePending { .. } => "waiting for its submission to be saved",
            SessionState::Finished { .. } => "finished",
        }
    }
}

/// A question as the trainee sees it: no correct answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub quiz_id: String,
    pub position: usize,
    pub total: usize,
    pub question: String,
    pub options: Vec<String>,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct RecordedAnswer {
    quiz_id: String,
    option_index: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    Next(QuestionView),
    Finished(Submission),
}

#[derive(Debug, Clone)]
pub struct QuizSession {
    trainee: String,
    chapter: String,
    questions: Vec<Quiz>,
    answers: Vec<RecordedAnswer>,
    score: Option<i64>,
    state: SessionState,
}

impl Default for QuizSession {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizSession {
    pub fn new() -> Self {
        Self {
            trainee: String::new(),
            chapter: String::new(),
            questions: Vec::new(),
            answers: Vec::new(),
            score: None,
            state: SessionState::NotStarted,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn trainee(&self) -> &str {
        &self.trainee
    }

    pub fn chapter(&self) -> &str {
        &self.chapter
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn answered(&self) -> usize {
        self.answers.len()
    }

    pub fn score(&self) -> Option<i64> {
        self.score
    }

    /// Picks the chapter's questions (in store order) and opens the session.
    /// On a validation failure nothing changes.
    pub fn start(&mut self, trainee: &str, chapter: &str, quizzes: &[Quiz]) -> Result<QuestionView, SessionError> {
        if self.state != SessionState::NotStarted {
            return Err(SessionError::InvalidState(self.state.name()));
        }
        let trainee = trainee.trim();
        if trainee.is_empty() {
            return Err(SessionError::Validation(CALLSIGN_REQUIRED));
        }
        let key = chapter_key(chapter);
        if key.is_empty() {
            return Err(SessionError::Validation(CHAPTER_REQUIRED));
        }
        let questions: Vec<Quiz> = quizzes
            .iter()
            .filter(|q| chapter_key(&q.chapter) == key)
            .cloned()
            .collect();
        if questions.is_empty() {
            return Err(SessionError::Validation(NO_QUESTIONS));
        }

        self.trainee = trainee.to_string();
        self.chapter = questions[0].chapter.trim().to_string();
        self.questions = questions;
        self.state = SessionState::InProgress;
        tracing::info!(
            trainee = %self.trainee,
            chapter = %self.chapter,
            questions = self.questions.len(),
            "session started"
        );
        self.current_question()
            .ok_or(SessionError::InvalidState("empty"))
    }

    pub fn current_question(&self) -> Option<QuestionView> {
        if self.state != SessionState::InProgress {
            return None;
        }
        let idx = self.answers.len();
        self.questions.get(idx).map(|q| QuestionView {
            quiz_id: q.id.clone(),
            position: idx + 1,
            total: self.questions.len(),
            question: q.question.clone(),
            options: q.options.clone(),
            image_url: q.image_url.clone(),
            audio_url: q.audio_url.clone(),
        })
    }

    /// Accepts the answer to the current question. The last answer triggers
    /// the one submission write.
    pub fn answer(&mut self, option_index: i64, store: &dyn QuizStore) -> Result<AnswerOutcome, SessionError> {
        if self.state != SessionState::InProgress {
            return Err(SessionError::InvalidState(self.state.name()));
        }
        let idx = self.answers.len();
        let Some(q) = self.questions.get(idx) else {
            return Err(SessionError::InvalidState("out of questions"));
        };
        let count = q.options.len();
        if option_index < 0 || option_index as usize >= count {
            return Err(SessionError::BadOption {
                index: option_index,
                count,
            });
        }
        self.answers.push(RecordedAnswer {
            quiz_id: q.id.clone(),
            option_index,
        });

        if let Some(next) = self.current_question() {
            return Ok(AnswerOutcome::Next(next));
        }

        let refs: Vec<&Quiz> = self.questions.iter().collect();
        let raw: Vec<i64> = self.answers.iter().map(|a| a.option_index).collect();
        self.score = Some(scoring::score(&raw, &refs));
        self.finalize(store).map(AnswerOutcome::Finished)
    }

    pub fn retry_finalize(&mut self, store: &dyn QuizStore) -> Result<Submission, SessionError> {
        match self.state {
            SessionState::FinalizePending { .. } => self.finalize(store),
            _ => Err(SessionError::InvalidState(self.state.name())),
        }
    }

    fn finalize(&mut self, store: &dyn QuizStore) -> Result<Submission, SessionError> {
        let new = NewSubmission {
            student_name: self.trainee.clone(),
            chapter: self.chapter.clone(),
            score: self.score.unwrap_or(0),
            raw_results: self.answers.iter().map(|a| a.option_index).collect(),
            question_ids: self.answers.iter().map(|a| a.quiz_id.clone()).collect(),
        };
        match store.insert_submission(&new) {
            Ok(saved) => {
                tracing::info!(
                    trainee = %self.trainee,
                    submission_id = %saved.id,
                    score = new.score,
                    "session finished"
                );
                self.state = SessionState::Finished {
                    submission: saved.clone(),
                };
                Ok(saved)
            }
            Err(e) => {
                tracing::error!(trainee = %self.trainee, error = %e, "submission write failed");
                self.state = SessionState::FinalizePending {
                    error: e.to_string(),
                };
                Err(SessionError::WriteFailed(e))
            }
        }
    }
}

/// Chapters a trainee can pick: those with at least one question, in the
/// order they first appear in the quiz list.
pub fn catalog(quizzes: &[Quiz]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    quizzes
        .iter()
        .filter(|q| {
            let key = chapter_key(&q.chapter);
            !key.is_empty() && seen.insert(key)
        })
        .map(|q| q.chapter.trim().to_string())
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::{Chapter, QuizDraft, ScoreValue};
    use std::cell::{Cell, RefCell};

    /// Store double that keeps submissions in memory and can be told to fail writes.
    #[derive(Default)]
    pub(crate) struct MemStore {
        pub quizzes: Vec<Quiz>,
        pub submissions: RefCell<Vec<Submission>>,
        pub fail_writes: Cell<bool>,
        pub write_attempts: Cell<usize>,
    }

    impl QuizStore for MemStore {
        fn list_chapters(&self) -> Result<Vec<Chapter>, StoreError> {
            Ok(Vec::new())
        }
        fn insert_chapter(&self, _name: &str) -> Result<Chapter, StoreError> {
            Err(StoreError::Conflict("read-only".into()))
        }
        fn list_quizzes(&self) -> Result<Vec<Quiz>, StoreError> {
            Ok(self.quizzes.clone())
        }
        fn insert_quiz(&self, _draft: &QuizDraft) -> Result<Quiz, StoreError> {
            Err(StoreError::Conflict("read-only".into()))
        }
        fn update_quiz(&self, _id: &str, _draft: &QuizDraft) -> Result<Quiz, StoreError> {
            Err(StoreError::NotFound("quiz"))
        }
        fn delete_quiz(&self, _id: &str) -> Result<(), StoreError> {
            Err(StoreError::NotFound("quiz"))
        }
        fn list_submissions(&self) -> Result<Vec<Submission>, StoreError> {
            Ok(self.submissions.borrow().iter().rev().cloned().collect())
        }
        fn submissions_for_student(&self, student_name: &str) -> Result<Vec<Submission>, StoreError> {
            Ok(self
                .list_submissions()?
                .into_iter()
                .filter(|s| s.student_name == student_name)
                .collect())
        }
        fn submission(&self, id: &str) -> Result<Option<Submission>, StoreError> {
            Ok(self.submissions.borrow().iter().find(|s| s.id == id).cloned())
        }
        fn insert_submission(&self, new: &NewSubmission) -> Result<Submission, StoreError> {
            self.write_attempts.set(self.write_attempts.get() + 1);
            if self.fail_writes.get() {
                return Err(StoreError::Insert {
                    table: "submissions",
                    source: rusqlite::Error::QueryReturnedNoRows,
                });
            }
            let mut subs = self.submissions.borrow_mut();
            let saved = Submission {
                id: format!("sub-{}", subs.len() + 1),
                student_name: new.student_name.clone(),
                chapter: new.chapter.clone(),
                score: ScoreValue::Number(new.score as f64),
                raw_results: new.raw_results.iter().map(|v| Some(*v)).collect(),
                question_ids: Some(new.question_ids.clone()),
                created_at: format!("2025-03-0{}T00:00:00Z", subs.len() + 1),
            };
            subs.push(saved.clone());
            Ok(saved)
        }
    }

    pub(crate) fn quiz(id: &str, chapter: &str, correct: i64) -> Quiz {
        Quiz {
            id: id.into(),
            chapter: chapter.into(),
            question: format!("Q{}", id),
            options: vec!["alpha".into(), "bravo".into(), "charlie".into()],
            correct_answer: correct,
            image_url: None,
            audio_url: None,
        }
    }

    fn store() -> MemStore {
        MemStore {
            quizzes: vec![quiz("1", "Radio", 1), quiz("2", "Nav", 0), quiz("3", "radio ", 2)],
            ..Default::default()
        }
    }

    #[test]
    fn catalog_lists_each_chapter_once() {
        assert_eq!(catalog(&store().quizzes), vec!["Radio".to_string(), "Nav".to_string()]);
        assert!(catalog(&[]).is_empty());
    }

    #[test]
    fn start_requires_callsign_and_chapter() {
        let s = store();
        let mut session = QuizSession::new();
        let e = session.start("  ", "Radio", &s.quizzes).expect_err("no name");
        assert_eq!(e.to_string(), CALLSIGN_REQUIRED);
        let e = session.start("KESTREL", "", &s.quizzes).expect_err("no chapter");
        assert_eq!(e.to_string(), CHAPTER_REQUIRED);
        let e = session.start("KESTREL", "Approach", &s.quizzes).expect_err("empty chapter");
        assert_eq!(e.to_string(), NO_QUESTIONS);
        assert_eq!(session.state(), &SessionState::NotStarted);
    }

    #[test]
    fn full_run_writes_exactly_one_submission() {
        let s = store();
        let mut session = QuizSession::new();
        let first = session.start("KESTREL", " RADIO", &s.quizzes).expect("start");
        assert_eq!(first.quiz_id, "1");
        assert_eq!(first.total, 2);

        let next = session.answer(1, &s).expect("answer 1");
        match next {
            AnswerOutcome::Next(q) => assert_eq!((q.quiz_id.as_str(), q.position), ("3", 2)),
            other => panic!("expected next question, got {:?}", other),
        }
        let done = session.answer(0, &s).expect("answer 2");
        let AnswerOutcome::Finished(sub) = done else {
            panic!("expected finish");
        };
        assert_eq!(sub.score, ScoreValue::Number(50.0));
        assert_eq!(sub.raw_results, vec![Some(1), Some(0)]);
        assert_eq!(sub.question_ids, Some(vec!["1".to_string(), "3".to_string()]));
        assert_eq!(sub.chapter, "Radio");
        assert_eq!(s.write_attempts.get(), 1);
        assert!(matches!(session.state(), SessionState::Finished { .. }));

        // No further answers once finished.
        let e = session.answer(0, &s).expect_err("finished");
        assert_eq!(e.code(), "invalid_state");
    }

    #[test]
    fn out_of_range_option_is_rejected_without_advancing() {
        let s = store();
        let mut session = QuizSession::new();
        session.start("KESTREL", "Nav", &s.quizzes).expect("start");
        assert_eq!(session.answer(3, &s).expect_err("range").code(), "bad_params");
        assert_eq!(session.answer(-1, &s).expect_err("range").code(), "bad_params");
        assert_eq!(session.answered(), 0);
        assert!(matches!(session.answer(0, &s), Ok(AnswerOutcome::Finished(_))));
        assert_eq!(session.score(), Some(100));
    }

    #[test]
    fn failed_write_stays_pending_until_retry_succeeds() {
        let s = store();
        s.fail_writes.set(true);
        let mut session = QuizSession::new();
        session.start("KESTREL", "Nav", &s.quizzes).expect("start");
        let e = session.answer(2, &s).expect_err("write fails");
        assert_eq!(e.code(), "submission_write_failed");
        assert!(matches!(session.state(), SessionState::FinalizePending { .. }));
        assert!(s.submissions.borrow().is_empty());

        // Still pending after another failed attempt.
        assert!(session.retry_finalize(&s).is_err());
        assert!(matches!(session.state(), SessionState::FinalizePending { .. }));

        s.fail_writes.set(false);
        let saved = session.retry_finalize(&s).expect("retry");
        assert_eq!(saved.score, ScoreValue::Number(0.0));
        assert_eq!(s.submissions.borrow().len(), 1);
        assert_eq!(s.write_attempts.get(), 3);
        assert!(matches!(session.state(), SessionState::Finished { .. }));
        assert_eq!(
            session.retry_finalize(&s).expect_err("done").code(),
            "invalid_state"
        );
    }
}
