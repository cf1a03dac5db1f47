
use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn chapters_are_unique_by_normalized_name() {
    let workspace = temp_dir("vsjx-bank-chapters");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let created = request_ok(&mut stdin, &mut reader, "2", "chapters.create", json!({ "name": "  Radio Procedures " }));
    assert_eq!(created.pointer("/chapter/name").and_then(|v| v.as_str()), Some("Radio Procedures"));

    let dup = request(&mut stdin, &mut reader, "3", "chapters.create", json!({ "name": "radio procedures" }));
    assert_eq!(error_code(&dup), Some("validation_failed"));
    let blank = request(&mut stdin, &mut reader, "4", "chapters.create", json!({ "name": "   " }));
    assert_eq!(error_code(&blank), Some("validation_failed"));

    let _ = request_ok(&mut stdin, &mut reader, "5", "chapters.create", json!({ "name": "Approach" }));
    let listed = request_ok(&mut stdin, &mut reader, "6", "chapters.list", json!({}));
    let names: Vec<&str> = listed["chapters"]
        .as_array()
        .expect("chapters")
        .iter()
        .filter_map(|c| c.get("name").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(names, vec!["Approach", "Radio Procedures"]);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn quiz_crud_validates_and_filters_by_chapter() {
    let workspace = temp_dir("vsjx-bank-quizzes");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "2", "chapters.create", json!({ "name": "Radio" }));
    let _ = request_ok(&mut stdin, &mut reader, "3", "chapters.create", json!({ "name": "Nav" }));

    let base = json!({
        "chapter": " radio ",
        "question": "Readback required for?",
        "options": ["Altimeter", "Taxi route", "Both"],
        "correctAnswer": 2,
        "imageUrl": "   ",
        "audioUrl": "https://cdn.example/atc.mp3"
    });
    let created = request_ok(&mut stdin, &mut reader, "4", "quizzes.create", base.clone());
    let quiz = &created["quiz"];
    let quiz_id = quiz["id"].as_str().expect("id").to_string();
    assert_eq!(quiz["chapter"], "Radio");
    assert!(quiz["imageUrl"].is_null());
    assert_eq!(quiz["audioUrl"], "https://cdn.example/atc.mp3");

    let mut two_options = base.clone();
    two_options["options"] = json!(["A", "B"]);
    let resp = request(&mut stdin, &mut reader, "5", "quizzes.create", two_options);
    assert_eq!(error_code(&resp), Some("validation_failed"));

    let mut bad_answer = base.clone();
    bad_answer["correctAnswer"] = json!(3);
    let resp = request(&mut stdin, &mut reader, "6", "quizzes.create", bad_answer);
    assert_eq!(error_code(&resp), Some("validation_failed"));

    let mut unknown_chapter = base.clone();
    unknown_chapter["chapter"] = json!("Weather");
    let resp = request(&mut stdin, &mut reader, "7", "quizzes.create", unknown_chapter);
    assert_eq!(error_code(&resp), Some("validation_failed"));

    let mut not_int = base.clone();
    not_int["correctAnswer"] = json!("2");
    let resp = request(&mut stdin, &mut reader, "8", "quizzes.create", not_int);
    assert_eq!(error_code(&resp), Some("bad_params"));

    let mut nav = base.clone();
    nav["chapter"] = json!("Nav");
    let _ = request_ok(&mut stdin, &mut reader, "9", "quizzes.create", nav);

    let all = request_ok(&mut stdin, &mut reader, "10", "quizzes.list", json!({ "chapter": "ALL" }));
    assert_eq!(all["quizzes"].as_array().map(|a| a.len()), Some(2));
    let radio = request_ok(&mut stdin, &mut reader, "11", "quizzes.list", json!({ "chapter": "RADIO" }));
    assert_eq!(radio["quizzes"].as_array().map(|a| a.len()), Some(1));

    let mut edit = base.clone();
    edit["quizId"] = json!(quiz_id);
    edit["question"] = json!("Readback required for which items?");
    edit["correctAnswer"] = json!(0);
    let updated = request_ok(&mut stdin, &mut reader, "12", "quizzes.update", edit);
    assert_eq!(updated.pointer("/quiz/correctAnswer"), Some(&json!(0)));
    assert_eq!(updated.pointer("/quiz/id").and_then(|v| v.as_str()), Some(quiz_id.as_str()));

    let mut missing = base.clone();
    missing["quizId"] = json!("nope");
    let resp = request(&mut stdin, &mut reader, "13", "quizzes.update", missing);
    assert_eq!(error_code(&resp), Some("not_found"));

    let _ = request_ok(&mut stdin, &mut reader, "14", "quizzes.delete", json!({ "quizId": quiz_id }));
    let resp = request(&mut stdin, &mut reader, "15", "quizzes.delete", json!({ "quizId": quiz_id }));
    assert_eq!(error_code(&resp), Some("not_found"));
    let radio = request_ok(&mut stdin, &mut reader, "16", "quizzes.list", json!({ "chapter": "Radio" }));
    assert_eq!(radio["quizzes"], json!([]));

    let _ = std::fs::remove_dir_all(workspace);
}
