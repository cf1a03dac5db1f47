use crate::bank;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, store_err};
use crate::ipc::types::{AppState, Request};
use crate::store::{QuizStore, SqliteStore};
use serde_json::json;

fn handle_chapters_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "chapters": [] }));
    };
    match SqliteStore::new(conn).list_chapters() {
        Ok(chapters) => ok(&req.id, json!({ "chapters": chapters })),
        Err(e) => store_err(req, &e),
    }
}

fn handle_chapters_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(name) = req.params.get("name").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing name", None);
    };
    match bank::create_chapter(&SqliteStore::new(conn), name) {
        Ok(chapter) => ok(&req.id, json!({ "chapter": chapter })),
        Err(e) => err(&req.id, e.code(), e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "chapters.list" => Some(handle_chapters_list(state, req)),
        "chapters.create" => Some(handle_chapters_create(state, req)),
        _ => None,
    }
}
