use crate::config::ScoringConfig;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str, store_err};
use crate::ipc::types::{AppState, Request};
use crate::scoring;
use crate::store::{QuizStore, Snapshot, SqliteStore};
use serde_json::{json, Value};

fn handle_dashboard_overview(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let scoring_cfg = match ScoringConfig::load(conn) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let snap = match Snapshot::load(&SqliteStore::new(conn)) {
        Ok(s) => s,
        Err(e) => return store_err(req, &e),
    };

    ok(
        &req.id,
        json!({
            "stats": scoring::aggregate(&snap.submissions, scoring_cfg.pass_threshold),
            "passThreshold": scoring_cfg.pass_threshold,
            "proficiency": scoring::proficiency_index(&snap.quizzes, &snap.submissions),
            "roster": scoring::roster(&snap.submissions),
        }),
    )
}

fn handle_dashboard_chapter_average(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let chapter = match required_str(req, "chapter") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match SqliteStore::new(conn).list_submissions() {
        Ok(subs) => ok(
            &req.id,
            json!({ "chapter": chapter, "avg": scoring::chapter_average(&chapter, &subs) }),
        ),
        Err(e) => store_err(req, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "dashboard.overview" => Some(handle_dashboard_overview(state, req)),
        "dashboard.chapterAverage" => Some(handle_dashboard_chapter_average(state, req)),
        _ => None,
    }
}
