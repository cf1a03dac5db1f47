use crate::config::ScoringConfig;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str, store_err, today_utc};
use crate::ipc::types::{AppState, Request};
use crate::report::{self, DebriefReport};
use crate::store::{QuizStore, SqliteStore};
use rusqlite::Connection;
use serde_json::{json, Value};

fn generated_on() -> String {
    today_utc().format("%Y-%m-%d").to_string()
}

fn pass_threshold(conn: &Connection, req: &Request) -> Result<f64, Value> {
    ScoringConfig::load(conn)
        .map(|c| c.pass_threshold)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))
}

pub(super) fn student_report(conn: &Connection, req: &Request, student: &str) -> Result<DebriefReport, Value> {
    let threshold = pass_threshold(conn, req)?;
    let store = SqliteStore::new(conn);
    let quizzes = store.list_quizzes().map_err(|e| store_err(req, &e))?;
    let submissions = store
        .submissions_for_student(student)
        .map_err(|e| store_err(req, &e))?;
    Ok(report::student_debrief(
        student,
        &submissions,
        &quizzes,
        threshold,
        &generated_on(),
    ))
}

fn handle_student_debrief(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student = match required_str(req, "studentName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match student_report(conn, req, &student) {
        Ok(r) => ok(&req.id, json!({ "report": r })),
        Err(e) => e,
    }
}

fn handle_submission_debrief(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let submission_id = match required_str(req, "submissionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let threshold = match pass_threshold(conn, req) {
        Ok(t) => t,
        Err(e) => return e,
    };
    let store = SqliteStore::new(conn);
    let submission = match store.submission(&submission_id) {
        Ok(Some(s)) => s,
        Ok(None) => return err(&req.id, "not_found", "submission not found", None),
        Err(e) => return store_err(req, &e),
    };
    let quizzes = match store.list_quizzes() {
        Ok(q) => q,
        Err(e) => return store_err(req, &e),
    };

    let r = report::build_report(
        &submission.student_name,
        std::slice::from_ref(&submission),
        &quizzes,
        threshold,
        &generated_on(),
    );
    ok(&req.id, json!({ "report": r }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "reports.studentDebrief" => Some(handle_student_debrief(state, req)),
        "reports.submissionDebrief" => Some(handle_submission_debrief(state, req)),
        _ => None,
    }
}
