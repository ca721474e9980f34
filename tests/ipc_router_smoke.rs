mod test_support;

use serde_json::json;
use test_support::{request, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("shuled-router-smoke");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert!(health["workspacePath"].is_null());

    // Data methods before a workspace is selected answer no_workspace.
    let no_ws = request_err(&mut stdin, &mut reader, "2", "terms.list", json!({}));
    assert_eq!(no_ws["code"].as_str(), Some("no_workspace"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let term = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "terms.create",
        json!({ "academicYear": "2026", "term": 2 }),
    );
    assert_eq!(term["label"].as_str(), Some("2026 Term 2"));
    let term_id = term["termId"].as_str().expect("termId").to_string();

    let terms = request_ok(&mut stdin, &mut reader, "5", "terms.list", json!({}));
    assert_eq!(terms["terms"].as_array().map(|a| a.len()), Some(1));

    let subject = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "subjects.create",
        json!({ "code": "KIS", "name": "Kiswahili", "maxMark": 100, "passMark": 45 }),
    );
    assert!(subject["subjectId"].as_str().is_some());
    let subjects = request_ok(&mut stdin, &mut reader, "7", "subjects.list", json!({}));
    assert_eq!(subjects["subjects"][0]["passMark"].as_i64(), Some(45));

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "students.create",
        json!({
            "admissionNo": "ADM001",
            "firstName": "Wanjiku",
            "lastName": "Kamau",
            "gender": "F",
            "classLevel": 1,
            "stream": "East",
        }),
    );
    assert!(student["studentId"].as_str().is_some());
    let students = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "students.list",
        json!({ "classLevel": 1, "stream": "East" }),
    );
    assert_eq!(
        students["students"][0]["displayName"].as_str(),
        Some("Kamau, Wanjiku")
    );

    let exam = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "exams.create",
        json!({ "termId": term_id, "name": "Mid-Term", "kind": "midterm" }),
    );
    assert!(exam["examId"].as_str().is_some());
    let exams = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "exams.list",
        json!({ "termId": term_id }),
    );
    assert_eq!(exams["exams"].as_array().map(|a| a.len()), Some(1));

    let unknown = request(&mut stdin, &mut reader, "12", "planner.publish", json!({}));
    assert_eq!(
        unknown["error"]["code"].as_str(),
        Some("not_implemented"),
        "unexpected response: {}",
        unknown
    );

    // Validation corners.
    let bad_term = request_err(
        &mut stdin,
        &mut reader,
        "13",
        "terms.create",
        json!({ "academicYear": "2026", "term": 4 }),
    );
    assert_eq!(bad_term["code"].as_str(), Some("bad_params"));
    let bad_gender = request_err(
        &mut stdin,
        &mut reader,
        "14",
        "students.create",
        json!({
            "admissionNo": "ADM002",
            "firstName": "A",
            "lastName": "B",
            "gender": "X",
            "classLevel": 1,
            "stream": "East",
        }),
    );
    assert_eq!(bad_gender["code"].as_str(), Some("bad_params"));
}
