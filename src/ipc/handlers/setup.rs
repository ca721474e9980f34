use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, opt_i64, opt_str, required_i64, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_terms_create(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let academic_year = match required_str(req, "academicYear") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let term = match required_i64(req, "term") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if !(1..=3).contains(&term) {
        return err(&req.id, "bad_params", "term must be in 1..=3", None);
    }
    let label = opt_str(req, "label").unwrap_or_else(|| format!("{} Term {}", academic_year, term));

    let id = Uuid::new_v4().to_string();
    let inserted = conn.execute(
        "INSERT INTO terms(id, academic_year, term, label) VALUES (?, ?, ?, ?)",
        (&id, &academic_year, term, &label),
    );
    match inserted {
        Ok(_) => ok(&req.id, json!({ "termId": id, "label": label })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_terms_list(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let mut stmt = match conn.prepare(
        "SELECT id, academic_year, term, label FROM terms ORDER BY academic_year, term",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "academicYear": r.get::<_, String>(1)?,
                "term": r.get::<_, i64>(2)?,
                "label": r.get::<_, String>(3)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(terms) => ok(&req.id, json!({ "terms": terms })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_subjects_create(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let code = match required_str(req, "code") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let max_mark = opt_i64(req, "maxMark").unwrap_or(100);
    let pass_mark = opt_i64(req, "passMark").unwrap_or(40);
    if max_mark <= 0 || pass_mark < 0 || pass_mark > max_mark {
        return err(
            &req.id,
            "bad_params",
            "passMark must be in 0..=maxMark and maxMark positive",
            Some(json!({ "maxMark": max_mark, "passMark": pass_mark })),
        );
    }

    let id = Uuid::new_v4().to_string();
    let inserted = conn.execute(
        "INSERT INTO subjects(id, code, name, max_mark, pass_mark, active)
         VALUES (?, ?, ?, ?, ?, 1)",
        (&id, &code, &name, max_mark, pass_mark),
    );
    match inserted {
        Ok(_) => ok(&req.id, json!({ "subjectId": id })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_subjects_list(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let mut stmt = match conn.prepare(
        "SELECT id, code, name, max_mark, pass_mark, active FROM subjects ORDER BY code",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "code": r.get::<_, String>(1)?,
                "name": r.get::<_, String>(2)?,
                "maxMark": r.get::<_, i64>(3)?,
                "passMark": r.get::<_, i64>(4)?,
                "active": r.get::<_, i64>(5)? != 0,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(subjects) => ok(&req.id, json!({ "subjects": subjects })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_create(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let admission_no = match required_str(req, "admissionNo") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let last_name = match required_str(req, "lastName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let first_name = match required_str(req, "firstName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let gender = match required_str(req, "gender") {
        Ok(v) => v.to_ascii_uppercase(),
        Err(resp) => return resp,
    };
    if gender != "M" && gender != "F" {
        return err(&req.id, "bad_params", "gender must be one of: M, F", None);
    }
    let class_level = match required_i64(req, "classLevel") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if !(1..=4).contains(&class_level) {
        return err(&req.id, "bad_params", "classLevel must be in 1..=4", None);
    }
    let stream = match required_str(req, "stream") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let id = Uuid::new_v4().to_string();
    let inserted = conn.execute(
        "INSERT INTO students(id, admission_no, last_name, first_name, gender, class_level, stream, active)
         VALUES (?, ?, ?, ?, ?, ?, ?, 1)",
        (&id, &admission_no, &last_name, &first_name, &gender, class_level, &stream),
    );
    match inserted {
        Ok(_) => ok(&req.id, json!({ "studentId": id })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_list(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let class_level = opt_i64(req, "classLevel");
    let stream = opt_str(req, "stream");

    let students = match crate::db::fetch_students_in_cohort(conn, class_level, stream.as_deref()) {
        Ok(v) => v,
        Err(e) => return crate::ipc::error::engine_err(&req.id, &e),
    };
    let out: Vec<serde_json::Value> = students
        .iter()
        .map(|s| {
            json!({
                "id": s.id,
                "admissionNo": s.admission_no,
                "displayName": s.display_name(),
                "gender": s.gender,
                "classLevel": s.class_level,
                "stream": s.stream,
            })
        })
        .collect();
    ok(&req.id, json!({ "students": out }))
}

fn handle_exams_create(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let term_id = match required_str(req, "termId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if let Err(e) = crate::db::fetch_term(conn, &term_id) {
        return crate::ipc::error::engine_err(&req.id, &e);
    }
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let kind = opt_str(req, "kind").unwrap_or_else(|| "endterm".to_string());
    if !matches!(kind.as_str(), "opener" | "midterm" | "endterm") {
        return err(
            &req.id,
            "bad_params",
            "kind must be one of: opener, midterm, endterm",
            None,
        );
    }

    let id = Uuid::new_v4().to_string();
    let inserted = conn.execute(
        "INSERT INTO exams(id, term_id, name, kind) VALUES (?, ?, ?, ?)",
        (&id, &term_id, &name, &kind),
    );
    match inserted {
        Ok(_) => ok(&req.id, json!({ "examId": id })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_exams_list(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let term_id = opt_str(req, "termId");

    let mut sql = String::from("SELECT id, term_id, name, kind FROM exams");
    let mut values: Vec<rusqlite::types::Value> = Vec::new();
    if let Some(term_id) = &term_id {
        sql.push_str(" WHERE term_id = ?");
        values.push(rusqlite::types::Value::Text(term_id.clone()));
    }
    sql.push_str(" ORDER BY name");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(values), |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "termId": r.get::<_, String>(1)?,
                "name": r.get::<_, String>(2)?,
                "kind": r.get::<_, String>(3)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(exams) => ok(&req.id, json!({ "exams": exams })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "terms.create" => Some(handle_terms_create(state, req)),
        "terms.list" => Some(handle_terms_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "exams.create" => Some(handle_exams_create(state, req)),
        "exams.list" => Some(handle_exams_list(state, req)),
        _ => None,
    }
}
