use crate::db;
use crate::grading;
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{db_conn, opt_str, required_i64, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;

/// Upsert one raw mark. Grade and points are derived from the mark and
/// written in the same statement, so the triple can never be stored out of
/// sync; re-entering a mark for the same (student, exam, subject) replaces
/// the previous row wholesale.
fn handle_marks_enter(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let marks = match required_i64(req, "marks") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let exam_exists: Result<Option<String>, _> = conn
        .query_row("SELECT id FROM exams WHERE id = ?", [&exam_id], |r| {
            r.get(0)
        })
        .optional();
    match exam_exists {
        Ok(Some(_)) => {}
        Ok(None) => return err(&req.id, "not_found", "exam not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }
    if let Err(e) = db::fetch_student(conn, &student_id) {
        return engine_err(&req.id, &e);
    }
    let subject = match db::fetch_subject(conn, &subject_id) {
        Ok(s) => s,
        Err(e) => return engine_err(&req.id, &e),
    };

    // Validation happens against the subject's own max mark; out-of-range
    // marks are rejected, never clamped.
    let (grade, points) = match grading::derive_result(marks, subject.max_mark) {
        Ok(pair) => pair,
        Err(e) => return engine_err(&req.id, &e),
    };
    let remarks =
        opt_str(req, "remarks").unwrap_or_else(|| grading::remark_for_grade(grade).to_string());

    let written = conn.execute(
        "INSERT INTO results(student_id, exam_id, subject_id, marks, grade, points, remarks, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, exam_id, subject_id) DO UPDATE SET
            marks = excluded.marks,
            grade = excluded.grade,
            points = excluded.points,
            remarks = excluded.remarks,
            updated_at = excluded.updated_at",
        (
            &student_id,
            &exam_id,
            &subject_id,
            marks,
            grade.as_str(),
            points,
            &remarks,
            db::now_rfc3339(),
        ),
    );
    match written {
        Ok(_) => ok(
            &req.id,
            json!({
                "studentId": student_id,
                "examId": exam_id,
                "subjectId": subject_id,
                "marks": marks,
                "grade": grade.as_str(),
                "points": points,
                "remarks": remarks,
            }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

/// Filterable read of raw marks with subject metadata attached. All four
/// filters are optional and combine with AND.
fn handle_marks_list(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = opt_str(req, "studentId");
    let exam_id = opt_str(req, "examId");
    let term_id = opt_str(req, "termId");
    let subject_id = opt_str(req, "subjectId");

    let mut sql = String::from(
        "SELECT r.student_id, r.exam_id, r.subject_id, r.marks, r.grade, r.points, r.remarks,
                sub.code, sub.name, sub.max_mark, sub.pass_mark
         FROM results r
         JOIN exams e ON r.exam_id = e.id
         JOIN subjects sub ON r.subject_id = sub.id
         WHERE 1 = 1",
    );
    let mut values: Vec<rusqlite::types::Value> = Vec::new();
    if let Some(v) = &student_id {
        sql.push_str(" AND r.student_id = ?");
        values.push(rusqlite::types::Value::Text(v.clone()));
    }
    if let Some(v) = &exam_id {
        sql.push_str(" AND r.exam_id = ?");
        values.push(rusqlite::types::Value::Text(v.clone()));
    }
    if let Some(v) = &term_id {
        sql.push_str(" AND e.term_id = ?");
        values.push(rusqlite::types::Value::Text(v.clone()));
    }
    if let Some(v) = &subject_id {
        sql.push_str(" AND r.subject_id = ?");
        values.push(rusqlite::types::Value::Text(v.clone()));
    }
    sql.push_str(" ORDER BY r.student_id, sub.code, r.exam_id");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(values), |r| {
            Ok(json!({
                "studentId": r.get::<_, String>(0)?,
                "examId": r.get::<_, String>(1)?,
                "subjectId": r.get::<_, String>(2)?,
                "marks": r.get::<_, i64>(3)?,
                "grade": r.get::<_, String>(4)?,
                "points": r.get::<_, i64>(5)?,
                "remarks": r.get::<_, String>(6)?,
                "subjectCode": r.get::<_, String>(7)?,
                "subjectName": r.get::<_, String>(8)?,
                "maxMark": r.get::<_, i64>(9)?,
                "passMark": r.get::<_, i64>(10)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(results) => ok(&req.id, json!({ "results": results })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.enter" => Some(handle_marks_enter(state, req)),
        "marks.list" => Some(handle_marks_list(state, req)),
        _ => None,
    }
}
