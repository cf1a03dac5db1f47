use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str, store_err};
use crate::ipc::types::{AppState, Request};
use crate::store::{normalize_timestamp, ImportedSubmission, QuizStore, SqliteStore};
use serde_json::{json, Value};

fn handle_submissions_list(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "submissions": [] }));
    };
    match SqliteStore::new(conn).list_submissions() {
        Ok(subs) => ok(&req.id, json!({ "submissions": subs })),
        Err(e) => store_err(req, &e),
    }
}

fn handle_submissions_history(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student = match required_str(req, "studentName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match SqliteStore::new(conn).submissions_for_student(&student) {
        Ok(subs) => ok(&req.id, json!({ "studentName": student, "submissions": subs })),
        Err(e) => store_err(req, &e),
    }
}

/// Accepts both the hosted backend's column names and camelCase.
fn field<'a>(row: &'a Value, snake: &str, camel: &str) -> Option<&'a Value> {
    row.get(snake).or_else(|| row.get(camel))
}

fn parse_import_row(i: usize, row: &Value) -> Result<ImportedSubmission, String> {
    if !row.is_object() {
        return Err(format!("rows[{}] must be an object", i));
    }
    let text = |v: Option<&Value>| v.and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let created_at = match field(row, "created_at", "createdAt") {
        None | Some(Value::Null) => None,
        Some(v) => {
            let normalized = v.as_str().and_then(normalize_timestamp);
            Some(normalized.ok_or_else(|| format!("rows[{}].created_at must be an RFC 3339 timestamp", i))?)
        }
    };
    Ok(ImportedSubmission {
        student_name: text(field(row, "student_name", "studentName")),
        chapter: text(row.get("analysis").or_else(|| row.get("chapter"))),
        score: row.get("score").cloned().unwrap_or(Value::Null),
        raw_results: field(row, "raw_results", "rawResults").cloned().unwrap_or(Value::Null),
        created_at,
    })
}

fn handle_submissions_import_rows(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(rows) = req.params.get("rows").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "rows must be an array", None);
    };
    let parsed = match rows
        .iter()
        .enumerate()
        .map(|(i, r)| parse_import_row(i, r))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match SqliteStore::new(conn).import_submissions(&parsed) {
        Ok(n) => {
            tracing::info!(rows = n, "imported submissions");
            ok(&req.id, json!({ "imported": n }))
        }
        Err(e) => store_err(req, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "submissions.list" => Some(handle_submissions_list(state, req)),
        "submissions.history" => Some(handle_submissions_history(state, req)),
        "submissions.importRows" => Some(handle_submissions_import_rows(state, req)),
        _ => None,
    }
}
