
use serde_json::json;
use std::io::{BufRead, Write};
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("vsjx-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let calls = [
        ("setup.get", json!({})),
        ("chapters.list", json!({})),
        ("quizzes.list", json!({ "chapter": "ALL" })),
        ("session.catalog", json!({})),
        ("session.get", json!({ "sessionId": "missing" })),
        ("session.answer", json!({ "sessionId": "missing", "optionIndex": 0 })),
        ("session.retryFinalize", json!({ "sessionId": "missing" })),
        ("submissions.list", json!({})),
        ("submissions.history", json!({ "studentName": "KESTREL" })),
        ("dashboard.overview", json!({})),
        ("dashboard.chapterAverage", json!({ "chapter": "Radio" })),
        ("reports.studentDebrief", json!({ "studentName": "KESTREL" })),
        ("reports.submissionDebrief", json!({ "submissionId": "missing" })),
        ("export.status", json!({ "studentName": "KESTREL" })),
    ];
    for (i, (method, params)) in calls.iter().enumerate() {
        let resp = request(&mut stdin, &mut reader, &format!("c{}", i), method, params.clone());
        assert_ne!(error_code(&resp), Some("not_implemented"), "{} not routed", method);
    }

    let unknown = request(&mut stdin, &mut reader, "3", "classes.list", json!({}));
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn workspace_required_before_writes() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    // Reads degrade to empty lists without a workspace.
    let chapters = request_ok(&mut stdin, &mut reader, "1", "chapters.list", json!({}));
    assert_eq!(chapters["chapters"], json!([]));

    for (i, (method, params)) in [
        ("chapters.create", json!({ "name": "Radio" })),
        ("session.start", json!({ "studentName": "K", "chapter": "Radio" })),
        ("dashboard.overview", json!({})),
        ("export.debriefPdf", json!({ "studentName": "K" })),
    ]
    .into_iter()
    .enumerate()
    {
        let resp = request(&mut stdin, &mut reader, &format!("w{}", i), method, params);
        assert_eq!(error_code(&resp), Some("no_workspace"), "{}", method);
    }

    let bad = request(&mut stdin, &mut reader, "2", "workspace.select", json!({}));
    assert_eq!(error_code(&bad), Some("bad_params"));
}

#[test]
fn unparsable_line_gets_bad_json_and_loop_continues() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    writeln!(stdin, "{{not json").expect("write");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(error_code(&value), Some("bad_json"));
    assert!(value.get("id").is_none());

    let _ = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
}
