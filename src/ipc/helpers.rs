use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde_json::Value;

use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::store::StoreError;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Absent and non-string values read as empty.
pub fn str_or_empty(req: &Request, key: &str) -> String {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

pub fn store_err(req: &Request, e: &StoreError) -> Value {
    if !matches!(e, StoreError::NotFound(_) | StoreError::Conflict(_) | StoreError::Timestamp(_)) {
        tracing::warn!(method = %req.method, error = %e, "store operation failed");
    }
    err(&req.id, e.code(), e.to_string(), None)
}

pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}
