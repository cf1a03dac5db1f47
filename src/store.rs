//! Data access for chapters, quizzes and submissions.
//!
//! Everything above this module talks to the [`QuizStore`] trait and receives
//! owned snapshots; nothing keeps rows around between requests.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::scoring::chapter_key;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(#[source] rusqlite::Error),
    #[error("insert into {table} failed: {source}")]
    Insert {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("update of {table} failed: {source}")]
    Update {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("delete from {table} failed: {source}")]
    Delete {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("not an RFC 3339 timestamp: {0}")]
    Timestamp(String),
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Query(_) => "db_query_failed",
            StoreError::Insert { .. } | StoreError::Encode(_) => "db_insert_failed",
            StoreError::Update { .. } => "db_update_failed",
            StoreError::Delete { .. } => "db_delete_failed",
            StoreError::NotFound(_) => "not_found",
            StoreError::Conflict(_) => "validation_failed",
            StoreError::Timestamp(_) => "bad_params",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub chapter: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: i64,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
}

/// Editable quiz fields, as submitted by the question bank editor.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizDraft {
    pub chapter: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: i64,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
}

/// A stored score exactly as the table holds it. Rows written by sessions are
/// always numbers; rows imported from the old backend may be anything.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreValue {
    Missing,
    Number(f64),
    Text(String),
}

impl ScoreValue {
    fn from_sql(v: Value) -> Self {
        match v {
            Value::Null | Value::Blob(_) => ScoreValue::Missing,
            Value::Integer(i) => ScoreValue::Number(i as f64),
            Value::Real(f) => ScoreValue::Number(f),
            Value::Text(s) => ScoreValue::Text(s),
        }
    }

    fn from_json(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Number(n) => n.as_f64().map(ScoreValue::Number).unwrap_or(ScoreValue::Missing),
            serde_json::Value::String(s) => ScoreValue::Text(s.clone()),
            serde_json::Value::Bool(b) => ScoreValue::Number(if *b { 1.0 } else { 0.0 }),
            _ => ScoreValue::Missing,
        }
    }

    fn to_sql(&self) -> Value {
        match self {
            ScoreValue::Missing => Value::Null,
            ScoreValue::Number(f) if f.fract() == 0.0 && f.is_finite() => Value::Integer(*f as i64),
            ScoreValue::Number(f) => Value::Real(*f),
            ScoreValue::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl Serialize for ScoreValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ScoreValue::Missing => serializer.serialize_none(),
            ScoreValue::Number(f) if f.fract() == 0.0 && f.is_finite() => {
                serializer.serialize_i64(*f as i64)
            }
            ScoreValue::Number(f) => serializer.serialize_f64(*f),
            ScoreValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub student_name: String,
    pub chapter: String,
    pub score: ScoreValue,
    /// Selected option per answer; `None` where a legacy row held no usable index.
    pub raw_results: Vec<Option<i64>>,
    /// Quiz answered by each entry of `raw_results`. Absent on legacy rows.
    pub question_ids: Option<Vec<String>>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSubmission {
    pub student_name: String,
    pub chapter: String,
    pub score: i64,
    pub raw_results: Vec<i64>,
    pub question_ids: Vec<String>,
}

/// One row exported from the old hosted backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedSubmission {
    pub student_name: String,
    pub chapter: String,
    pub score: serde_json::Value,
    pub raw_results: serde_json::Value,
    pub created_at: Option<String>,
}

pub trait QuizStore {
    fn list_chapters(&self) -> Result<Vec<Chapter>, StoreError>;
    fn insert_chapter(&self, name: &str) -> Result<Chapter, StoreError>;

    fn list_quizzes(&self) -> Result<Vec<Quiz>, StoreError>;
    fn insert_quiz(&self, draft: &QuizDraft) -> Result<Quiz, StoreError>;
    fn update_quiz(&self, id: &str, draft: &QuizDraft) -> Result<Quiz, StoreError>;
    fn delete_quiz(&self, id: &str) -> Result<(), StoreError>;

    /// Newest first.
    fn list_submissions(&self) -> Result<Vec<Submission>, StoreError>;
    /// Newest first, exact name match.
    fn submissions_for_student(&self, student_name: &str) -> Result<Vec<Submission>, StoreError>;
    fn submission(&self, id: &str) -> Result<Option<Submission>, StoreError>;
    fn insert_submission(&self, new: &NewSubmission) -> Result<Submission, StoreError>;
}

/// Quizzes and submissions read together for dashboard aggregation.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub quizzes: Vec<Quiz>,
    pub submissions: Vec<Submission>,
}

impl Snapshot {
    pub fn load(store: &dyn QuizStore) -> Result<Self, StoreError> {
        let quizzes = store.list_quizzes()?;
        let submissions = store.list_submissions()?;
        tracing::debug!(
            quizzes = quizzes.len(),
            submissions = submissions.len(),
            "snapshot loaded"
        );
        Ok(Self {
            quizzes,
            submissions,
        })
    }
}

pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn quiz_by_id(&self, id: &str) -> Result<Option<Quiz>, StoreError> {
        self.conn
            .query_row(
                "SELECT id, chapter, question, options, correct_answer, image_url, audio_url
                 FROM quizzes WHERE id = ?",
                [id],
                quiz_from_row,
            )
            .optional()
            .map_err(StoreError::Query)
    }

    fn query_submissions(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Submission>, StoreError> {
        let mut stmt = self.conn.prepare(sql).map_err(StoreError::Query)?;
        stmt.query_map(params, submission_from_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(StoreError::Query)
    }

    /// Inserts rows carried over from the old backend. They keep the positional
    /// `raw_results` layout and get no `question_ids`; timestamps are rewritten
    /// to the canonical UTC form so newest-first ordering holds.
    pub fn import_submissions(&self, rows: &[ImportedSubmission]) -> Result<usize, StoreError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| StoreError::Insert {
                table: "submissions",
                source: e,
            })?;
        for row in rows {
            let raw = match &row.raw_results {
                serde_json::Value::Array(_) => serde_json::to_string(&row.raw_results)?,
                _ => "[]".to_string(),
            };
            let created_at = match &row.created_at {
                Some(raw) => normalize_timestamp(raw).ok_or_else(|| StoreError::Timestamp(raw.clone()))?,
                None => now_rfc3339(),
            };
            tx.execute(
                "INSERT INTO submissions(id, student_name, analysis, score, raw_results, created_at)
                 VALUES(?, ?, ?, ?, ?, ?)",
                (
                    Uuid::new_v4().to_string(),
                    &row.student_name,
                    &row.chapter,
                    ScoreValue::from_json(&row.score).to_sql(),
                    raw,
                    created_at,
                ),
            )
            .map_err(|e| StoreError::Insert {
                table: "submissions",
                source: e,
            })?;
        }
        tx.commit().map_err(|e| StoreError::Insert {
            table: "submissions",
            source: e,
        })?;
        Ok(rows.len())
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// `created_at` is sorted as text, so every stored value uses the same
/// offset (Z) and precision (microseconds) as [`now_rfc3339`].
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn parse_options(id: &str, raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(quiz_id = id, error = %e, "unreadable quiz options");
            Vec::new()
        }
    }
}

fn parse_raw_results(raw: &str) -> Vec<Option<i64>> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(items)) => items.iter().map(|v| v.as_i64()).collect(),
        _ => Vec::new(),
    }
}

fn parse_question_ids(raw: Option<String>) -> Option<Vec<String>> {
    raw.and_then(|s| serde_json::from_str::<Vec<String>>(&s).ok())
}

fn quiz_from_row(row: &Row<'_>) -> rusqlite::Result<Quiz> {
    let id: String = row.get(0)?;
    let options_raw: String = row.get(3)?;
    let options = parse_options(&id, &options_raw);
    Ok(Quiz {
        id,
        chapter: row.get(1)?,
        question: row.get(2)?,
        options,
        correct_answer: row.get(4)?,
        image_url: row.get(5)?,
        audio_url: row.get(6)?,
    })
}

const SUBMISSION_COLUMNS: &str =
    "id, student_name, analysis, score, raw_results, question_ids, created_at";

fn submission_from_row(row: &Row<'_>) -> rusqlite::Result<Submission> {
    let raw_results: String = row.get(4)?;
    Ok(Submission {
        id: row.get(0)?,
        student_name: row.get(1)?,
        chapter: row.get(2)?,
        score: ScoreValue::from_sql(row.get(3)?),
        raw_results: parse_raw_results(&raw_results),
        question_ids: parse_question_ids(row.get(5)?),
        created_at: row.get(6)?,
    })
}

impl QuizStore for SqliteStore<'_> {
    fn list_chapters(&self) -> Result<Vec<Chapter>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM chapters ORDER BY name")
            .map_err(StoreError::Query)?;
        stmt.query_map([], |r| {
            Ok(Chapter {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::Query)
    }

    fn insert_chapter(&self, name: &str) -> Result<Chapter, StoreError> {
        let key = chapter_key(name);
        let existing: Option<String> = self
            .conn
            .query_row("SELECT name FROM chapters WHERE name_key = ?", [&key], |r| {
                r.get(0)
            })
            .optional()
            .map_err(StoreError::Query)?;
        if let Some(existing) = existing {
            return Err(StoreError::Conflict(format!(
                "chapter already exists: {}",
                existing
            )));
        }

        let chapter = Chapter {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        self.conn
            .execute(
                "INSERT INTO chapters(id, name, name_key) VALUES(?, ?, ?)",
                (&chapter.id, &chapter.name, &key),
            )
            .map_err(|e| StoreError::Insert {
                table: "chapters",
                source: e,
            })?;
        Ok(chapter)
    }

    fn list_quizzes(&self) -> Result<Vec<Quiz>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, chapter, question, options, correct_answer, image_url, audio_url
                 FROM quizzes
                 ORDER BY rowid",
            )
            .map_err(StoreError::Query)?;
        stmt.query_map([], quiz_from_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(StoreError::Query)
    }

    fn insert_quiz(&self, draft: &QuizDraft) -> Result<Quiz, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO quizzes(id, chapter, question, options, correct_answer, image_url, audio_url)
                 VALUES(?, ?, ?, ?, ?, ?, ?)",
                (
                    &id,
                    &draft.chapter,
                    &draft.question,
                    serde_json::to_string(&draft.options)?,
                    draft.correct_answer,
                    &draft.image_url,
                    &draft.audio_url,
                ),
            )
            .map_err(|e| StoreError::Insert {
                table: "quizzes",
                source: e,
            })?;
        self.quiz_by_id(&id)?.ok_or(StoreError::NotFound("quiz"))
    }

    fn update_quiz(&self, id: &str, draft: &QuizDraft) -> Result<Quiz, StoreError> {
        let changed = self
            .conn
            .execute(
                "UPDATE quizzes
                 SET chapter = ?, question = ?, options = ?, correct_answer = ?, image_url = ?, audio_url = ?
                 WHERE id = ?",
                (
                    &draft.chapter,
                    &draft.question,
                    serde_json::to_string(&draft.options)?,
                    draft.correct_answer,
                    &draft.image_url,
                    &draft.audio_url,
                    id,
                ),
            )
            .map_err(|e| StoreError::Update {
                table: "quizzes",
                source: e,
            })?;
        if changed == 0 {
            return Err(StoreError::NotFound("quiz"));
        }
        self.quiz_by_id(id)?.ok_or(StoreError::NotFound("quiz"))
    }

    fn delete_quiz(&self, id: &str) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM quizzes WHERE id = ?", [id])
            .map_err(|e| StoreError::Delete {
                table: "quizzes",
                source: e,
            })?;
        if changed == 0 {
            return Err(StoreError::NotFound("quiz"));
        }
        Ok(())
    }

    fn list_submissions(&self) -> Result<Vec<Submission>, StoreError> {
        self.query_submissions(
            &format!(
                "SELECT {} FROM submissions ORDER BY created_at DESC, rowid DESC",
                SUBMISSION_COLUMNS
            ),
            [],
        )
    }

    fn submissions_for_student(&self, student_name: &str) -> Result<Vec<Submission>, StoreError> {
        self.query_submissions(
            &format!(
                "SELECT {} FROM submissions WHERE student_name = ? ORDER BY created_at DESC, rowid DESC",
                SUBMISSION_COLUMNS
            ),
            [student_name],
        )
    }

    fn submission(&self, id: &str) -> Result<Option<Submission>, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM submissions WHERE id = ?", SUBMISSION_COLUMNS),
                [id],
                submission_from_row,
            )
            .optional()
            .map_err(StoreError::Query)
    }

    fn insert_submission(&self, new: &NewSubmission) -> Result<Submission, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO submissions(id, student_name, analysis, score, raw_results, question_ids, created_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?)",
                (
                    &id,
                    &new.student_name,
                    &new.chapter,
                    new.score,
                    serde_json::to_string(&new.raw_results)?,
                    serde_json::to_string(&new.question_ids)?,
                    now_rfc3339(),
                ),
            )
            .map_err(|e| StoreError::Insert {
                table: "submissions",
                source: e,
            })?;
        self.submission(&id)?.ok_or(StoreError::NotFound("submission"))
    }
}
