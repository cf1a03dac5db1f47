use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str, store_err, str_or_empty};
use crate::ipc::types::{AppState, Request};
use crate::session::{self, AnswerOutcome, QuizSession, SessionError};
use crate::store::{QuizStore, SqliteStore};
use serde_json::{json, Value};
use uuid::Uuid;

fn session_json(id: &str, s: &QuizSession) -> Value {
    json!({
        "sessionId": id,
        "trainee": s.trainee(),
        "chapter": s.chapter(),
        "total": s.total(),
        "answered": s.answered(),
        "score": s.score(),
        "state": s.state(),
        "question": s.current_question(),
    })
}

fn session_err(req: &Request, session_id: &str, e: &SessionError) -> Value {
    let details = match e {
        SessionError::WriteFailed(_) => Some(json!({ "sessionId": session_id, "retryable": true })),
        _ => None,
    };
    err(&req.id, e.code(), e.to_string(), details)
}

fn handle_session_catalog(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "chapters": [] }));
    };
    match SqliteStore::new(conn).list_quizzes() {
        Ok(quizzes) => ok(&req.id, json!({ "chapters": session::catalog(&quizzes) })),
        Err(e) => store_err(req, &e),
    }
}

fn handle_session_start(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let quizzes = match SqliteStore::new(conn).list_quizzes() {
        Ok(q) => q,
        Err(e) => return store_err(req, &e),
    };

    let mut s = QuizSession::new();
    let student = str_or_empty(req, "studentName");
    let chapter = str_or_empty(req, "chapter");
    if let Err(e) = s.start(&student, &chapter, &quizzes) {
        return err(&req.id, e.code(), e.to_string(), None);
    }

    let session_id = Uuid::new_v4().to_string();
    let body = session_json(&session_id, &s);
    state.sessions.insert(session_id, s);
    ok(&req.id, body)
}

fn handle_session_get(state: &mut AppState, req: &Request) -> Value {
    let session_id = match required_str(req, "sessionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match state.sessions.get(&session_id) {
        Some(s) => ok(&req.id, session_json(&session_id, s)),
        None => err(&req.id, "not_found", "session not found", None),
    }
}

fn handle_session_answer(state: &mut AppState, req: &Request) -> Value {
    let session_id = match required_str(req, "sessionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(option_index) = req.params.get("optionIndex").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "optionIndex must be an integer", None);
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(s) = state.sessions.get_mut(&session_id) else {
        return err(&req.id, "not_found", "session not found", None);
    };

    match s.answer(option_index, &SqliteStore::new(conn)) {
        Ok(AnswerOutcome::Next(_)) => ok(&req.id, session_json(&session_id, s)),
        Ok(AnswerOutcome::Finished(submission)) => {
            let body = session_json(&session_id, s);
            state.sessions.remove(&session_id);
            ok(&req.id, json!({ "session": body, "submission": submission }))
        }
        Err(e) => session_err(req, &session_id, &e),
    }
}

fn handle_session_retry_finalize(state: &mut AppState, req: &Request) -> Value {
    let session_id = match required_str(req, "sessionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(s) = state.sessions.get_mut(&session_id) else {
        return err(&req.id, "not_found", "session not found", None);
    };

    match s.retry_finalize(&SqliteStore::new(conn)) {
        Ok(submission) => {
            let body = session_json(&session_id, s);
            state.sessions.remove(&session_id);
            ok(&req.id, json!({ "session": body, "submission": submission }))
        }
        Err(e) => session_err(req, &session_id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "session.catalog" => Some(handle_session_catalog(state, req)),
        "session.start" => Some(handle_session_start(state, req)),
        "session.get" => Some(handle_session_get(state, req)),
        "session.answer" => Some(handle_session_answer(state, req)),
        "session.retryFinalize" => Some(handle_session_retry_finalize(state, req)),
        _ => None,
    }
}
