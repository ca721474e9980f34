#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_shuled");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn shuled");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

/// Issue a request and unwrap its `result`, panicking on error responses.
pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "request {} failed: {}",
        method,
        value
    );
    value.get("result").cloned().expect("result")
}

/// Issue a request expected to fail; returns the error object.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "request {} unexpectedly succeeded: {}",
        method,
        value
    );
    value.get("error").cloned().expect("error")
}

/// A workspace with one term, two 100-mark subjects (pass mark 40) and one
/// end-of-term exam; returns (termId, examId, [mathId, engId]).
pub fn seed_basic_academics(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &PathBuf,
) -> (String, String, Vec<String>) {
    let _ = request_ok(
        stdin,
        reader,
        "seed-ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let term = request_ok(
        stdin,
        reader,
        "seed-term",
        "terms.create",
        json!({ "academicYear": "2026", "term": 1 }),
    );
    let term_id = term["termId"].as_str().expect("termId").to_string();
    let exam = request_ok(
        stdin,
        reader,
        "seed-exam",
        "exams.create",
        json!({ "termId": term_id, "name": "End of Term 1", "kind": "endterm" }),
    );
    let exam_id = exam["examId"].as_str().expect("examId").to_string();

    let mut subject_ids = Vec::new();
    for (i, (code, name)) in [("MAT", "Mathematics"), ("ENG", "English")].iter().enumerate() {
        let subject = request_ok(
            stdin,
            reader,
            &format!("seed-sub-{}", i),
            "subjects.create",
            json!({ "code": code, "name": name, "maxMark": 100, "passMark": 40 }),
        );
        subject_ids.push(subject["subjectId"].as_str().expect("subjectId").to_string());
    }
    (term_id, exam_id, subject_ids)
}

pub fn create_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    admission_no: &str,
    name: (&str, &str),
    gender: &str,
    class_level: i64,
    stream: &str,
) -> String {
    let created = request_ok(
        stdin,
        reader,
        id,
        "students.create",
        json!({
            "admissionNo": admission_no,
            "firstName": name.0,
            "lastName": name.1,
            "gender": gender,
            "classLevel": class_level,
            "stream": stream,
        }),
    );
    created["studentId"].as_str().expect("studentId").to_string()
}

pub fn enter_mark(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    exam_id: &str,
    student_id: &str,
    subject_id: &str,
    marks: i64,
) -> serde_json::Value {
    request_ok(
        stdin,
        reader,
        id,
        "marks.enter",
        json!({
            "examId": exam_id,
            "studentId": student_id,
            "subjectId": subject_id,
            "marks": marks,
        }),
    )
}
