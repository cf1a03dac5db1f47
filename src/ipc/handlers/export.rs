use super::reports::student_report;
use crate::config::{ExportConfig, Theme};
use crate::export::{self, ExportStatus};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{required_str, today_utc};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};
use std::path::PathBuf;

fn status_json(student: &str, status: &ExportStatus) -> Value {
    json!({
        "studentName": student,
        "status": status,
        "label": status.label(),
    })
}

fn handle_export_debrief_pdf(state: &mut AppState, req: &Request) -> Value {
    let student = match required_str(req, "studentName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (Some(conn), Some(workspace)) = (state.db.as_ref(), state.workspace.as_ref()) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let out_dir = req
        .params
        .get("outDir")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| workspace.join("exports"));

    state.exports.insert(student.clone(), ExportStatus::Preparing);

    let report = match student_report(conn, req, &student) {
        Ok(r) => r,
        Err(e) => {
            state.exports.insert(
                student.clone(),
                ExportStatus::Failed {
                    message: "report could not be loaded".into(),
                },
            );
            return e;
        }
    };
    let settings = ExportConfig::load(conn).and_then(|c| Ok((c, Theme::load(conn)?)));
    let result = match settings {
        Ok((config, theme)) => export::export_debrief(&report, &theme, &config, &out_dir, today_utc())
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    match result {
        Ok(artifact) => {
            let status = ExportStatus::Generated {
                path: artifact.path.to_string_lossy().to_string(),
            };
            let body = json!({
                "artifact": artifact,
                "status": status,
                "label": status.label(),
            });
            state.exports.insert(student, status);
            ok(&req.id, body)
        }
        Err(message) => {
            tracing::error!(student = %student, error = %message, "debrief export failed");
            let status = ExportStatus::Failed {
                message: message.clone(),
            };
            let details = status_json(&student, &status);
            state.exports.insert(student, status);
            err(&req.id, "export_failed", message, Some(details))
        }
    }
}

fn handle_export_status(state: &mut AppState, req: &Request) -> Value {
    let student = match required_str(req, "studentName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let status = state
        .exports
        .get(&student)
        .cloned()
        .unwrap_or(ExportStatus::Idle);
    ok(&req.id, status_json(&student, &status))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "export.debriefPdf" => Some(handle_export_debrief_pdf(state, req)),
        "export.status" => Some(handle_export_status(state, req)),
        _ => None,
    }
}
