use crate::bank::{self, BankError};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store::{QuizDraft, SqliteStore};
use serde_json::{json, Value};

fn bank_err(req: &Request, e: &BankError) -> Value {
    if let BankError::Store(inner) = e {
        tracing::warn!(method = %req.method, error = %inner, "question bank write failed");
    }
    err(&req.id, e.code(), e.to_string(), None)
}

fn optional_url(req: &Request, key: &str) -> Result<Option<String>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(err(&req.id, "bad_params", format!("{} must be a string", key), None)),
    }
}

fn parse_draft(req: &Request) -> Result<QuizDraft, Value> {
    let chapter = req
        .params
        .get("chapter")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let question = req
        .params
        .get("question")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let options = match req.params.get("options").and_then(|v| v.as_array()) {
        Some(arr) => arr
            .iter()
            .map(|o| o.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| err(&req.id, "bad_params", "options must be strings", None))?,
        None => return Err(err(&req.id, "bad_params", "missing options", None)),
    };
    let Some(correct_answer) = req.params.get("correctAnswer").and_then(|v| v.as_i64()) else {
        return Err(err(&req.id, "bad_params", "correctAnswer must be an integer", None));
    };
    Ok(QuizDraft {
        chapter,
        question,
        options,
        correct_answer,
        image_url: optional_url(req, "imageUrl")?,
        audio_url: optional_url(req, "audioUrl")?,
    })
}

fn handle_quizzes_list(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "quizzes": [] }));
    };
    let chapter = req.params.get("chapter").and_then(|v| v.as_str());
    match bank::list_quizzes(&SqliteStore::new(conn), chapter) {
        Ok(quizzes) => ok(&req.id, json!({ "quizzes": quizzes })),
        Err(e) => bank_err(req, &e),
    }
}

fn handle_quizzes_create(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let draft = match parse_draft(req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    match bank::create_quiz(&SqliteStore::new(conn), draft) {
        Ok(quiz) => ok(&req.id, json!({ "quiz": quiz })),
        Err(e) => bank_err(req, &e),
    }
}

fn handle_quizzes_update(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let quiz_id = match required_str(req, "quizId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let draft = match parse_draft(req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    match bank::update_quiz(&SqliteStore::new(conn), &quiz_id, draft) {
        Ok(quiz) => ok(&req.id, json!({ "quiz": quiz })),
        Err(e) => bank_err(req, &e),
    }
}

fn handle_quizzes_delete(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let quiz_id = match required_str(req, "quizId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match bank::delete_quiz(&SqliteStore::new(conn), &quiz_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => bank_err(req, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "quizzes.list" => Some(handle_quizzes_list(state, req)),
        "quizzes.create" => Some(handle_quizzes_create(state, req)),
        "quizzes.update" => Some(handle_quizzes_update(state, req)),
        "quizzes.delete" => Some(handle_quizzes_delete(state, req)),
        _ => None,
    }
}
