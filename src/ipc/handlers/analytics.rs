use crate::analytics;
use crate::db;
use crate::grading::Grade;
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{db_conn, opt_i64, opt_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::rank::{self, RankEntry, TermSummary};
use rusqlite::Connection;
use serde_json::json;

/// Summary row plus the student columns the analytics projections group by.
struct SummaryWithStudent {
    summary: TermSummary,
    gender: String,
    stream: String,
    display_name: String,
    admission_no: String,
}

fn load_term_summaries(
    conn: &Connection,
    term_id: &str,
    class_level: Option<i64>,
    stream: Option<&str>,
) -> Result<Vec<SummaryWithStudent>, rusqlite::Error> {
    let mut sql = String::from(
        "SELECT rs.student_id, rs.total_marks, rs.average, rs.mean_grade, rs.total_points,
                rs.subjects_taken, s.gender, s.stream, s.last_name, s.first_name, s.admission_no
         FROM result_summaries rs
         JOIN students s ON rs.student_id = s.id
         WHERE rs.term_id = ? AND s.active = 1",
    );
    let mut values: Vec<rusqlite::types::Value> =
        vec![rusqlite::types::Value::Text(term_id.to_string())];
    if let Some(level) = class_level {
        sql.push_str(" AND s.class_level = ?");
        values.push(rusqlite::types::Value::Integer(level));
    }
    if let Some(stream) = stream {
        sql.push_str(" AND s.stream = ?");
        values.push(rusqlite::types::Value::Text(stream.to_string()));
    }
    sql.push_str(" ORDER BY s.stream, rs.student_id");

    let mut stmt = conn.prepare(&sql)?;
    stmt.query_map(rusqlite::params_from_iter(values), |r| {
        let last: String = r.get(8)?;
        let first: String = r.get(9)?;
        Ok(SummaryWithStudent {
            summary: TermSummary {
                student_id: r.get(0)?,
                term_id: term_id.to_string(),
                total_marks: r.get(1)?,
                average: r.get(2)?,
                mean_grade: Grade::parse(&r.get::<_, String>(3)?).unwrap_or(Grade::E),
                total_points: r.get(4)?,
                subjects_taken: r.get::<_, i64>(5)? as usize,
            },
            gender: r.get(6)?,
            stream: r.get(7)?,
            display_name: format!("{}, {}", last, first),
            admission_no: r.get(10)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
}

/// Mean/max/min and pass rate for one subject in one term. The pass
/// threshold comes from the subject's own pass mark.
fn handle_subject_performance(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let term_id = match required_str(req, "termId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let class_level = opt_i64(req, "classLevel");

    if let Err(e) = db::fetch_term(conn, &term_id) {
        return engine_err(&req.id, &e);
    }
    let subject = match db::fetch_subject(conn, &subject_id) {
        Ok(s) => s,
        Err(e) => return engine_err(&req.id, &e),
    };

    let mut sql = String::from(
        "SELECT r.marks
         FROM results r
         JOIN exams e ON r.exam_id = e.id
         JOIN students s ON r.student_id = s.id
         WHERE e.term_id = ? AND r.subject_id = ? AND s.active = 1",
    );
    let mut values: Vec<rusqlite::types::Value> = vec![
        rusqlite::types::Value::Text(term_id.clone()),
        rusqlite::types::Value::Text(subject_id.clone()),
    ];
    if let Some(level) = class_level {
        sql.push_str(" AND s.class_level = ?");
        values.push(rusqlite::types::Value::Integer(level));
    }

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let marks = stmt
        .query_map(rusqlite::params_from_iter(values), |r| r.get::<_, i64>(0))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    let marks = match marks {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let statistics = analytics::subject_statistics(&marks, subject.pass_mark);
    ok(
        &req.id,
        json!({
            "subjectId": subject.id,
            "subjectCode": subject.code,
            "subjectName": subject.name,
            "passMark": subject.pass_mark,
            "statistics": statistics,
        }),
    )
}

fn handle_class_performance(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let term_id = match required_str(req, "termId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let class_level = match crate::ipc::helpers::required_i64(req, "classLevel") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let stream = opt_str(req, "stream");

    if let Err(e) = db::fetch_term(conn, &term_id) {
        return engine_err(&req.id, &e);
    }
    let rows = match load_term_summaries(conn, &term_id, Some(class_level), stream.as_deref()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let summaries: Vec<TermSummary> = rows.into_iter().map(|r| r.summary).collect();
    let performance = analytics::class_performance(&summaries);
    ok(
        &req.id,
        json!({
            "termId": term_id,
            "classLevel": class_level,
            "stream": stream,
            "performance": performance,
        }),
    )
}

fn handle_streams_compare(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let term_id = match required_str(req, "termId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let class_level = match crate::ipc::helpers::required_i64(req, "classLevel") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    if let Err(e) = db::fetch_term(conn, &term_id) {
        return engine_err(&req.id, &e);
    }
    let rows = match load_term_summaries(conn, &term_id, Some(class_level), None) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut by_stream: Vec<(String, Vec<TermSummary>)> = Vec::new();
    for row in rows {
        match by_stream.iter_mut().find(|(s, _)| *s == row.stream) {
            Some((_, list)) => list.push(row.summary),
            None => by_stream.push((row.stream, vec![row.summary])),
        }
    }
    by_stream.sort_by(|a, b| a.0.cmp(&b.0));

    let compared = analytics::compare_streams(&by_stream);
    ok(
        &req.id,
        json!({
            "termId": term_id,
            "classLevel": class_level,
            "streams": compared,
        }),
    )
}

fn handle_gender_gap(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let term_id = match required_str(req, "termId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let class_level = opt_i64(req, "classLevel");

    if let Err(e) = db::fetch_term(conn, &term_id) {
        return engine_err(&req.id, &e);
    }
    let rows = match load_term_summaries(conn, &term_id, class_level, None) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let pairs: Vec<(String, f64)> = rows
        .iter()
        .map(|r| (r.gender.clone(), r.summary.average))
        .collect();
    let gap = analytics::gender_gap(&pairs);
    ok(
        &req.id,
        json!({
            "termId": term_id,
            "classLevel": class_level,
            "genderGap": gap,
        }),
    )
}

/// Most recent N term summaries for one student, newest first, projected to
/// trend points.
fn handle_student_trend(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let num_terms = opt_i64(req, "numTerms").unwrap_or(3);
    if num_terms < 1 {
        return err(&req.id, "bad_params", "numTerms must be >= 1", None);
    }
    if let Err(e) = db::fetch_student(conn, &student_id) {
        return engine_err(&req.id, &e);
    }

    let mut stmt = match conn.prepare(
        "SELECT t.label, rs.average, rs.mean_grade, rs.position_in_class
         FROM result_summaries rs
         JOIN terms t ON rs.term_id = t.id
         WHERE rs.student_id = ?
         ORDER BY t.academic_year DESC, t.term DESC
         LIMIT ?",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let points = stmt
        .query_map((&student_id, num_terms), |r| {
            Ok(analytics::TrendPoint {
                term_label: r.get(0)?,
                average: r.get(1)?,
                mean_grade: Grade::parse(&r.get::<_, String>(2)?).unwrap_or(Grade::E),
                position: r.get(3)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    let points = match points {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let trend = analytics::student_trend(points);
    ok(
        &req.id,
        json!({
            "studentId": student_id,
            "numTerms": num_terms,
            "trend": trend,
        }),
    )
}

fn handle_top_performers(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let term_id = match required_str(req, "termId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let class_level = opt_i64(req, "classLevel");
    let limit = opt_i64(req, "limit").unwrap_or(10);
    if limit < 1 {
        return err(&req.id, "bad_params", "limit must be >= 1", None);
    }

    if let Err(e) = db::fetch_term(conn, &term_id) {
        return engine_err(&req.id, &e);
    }
    let rows = match load_term_summaries(conn, &term_id, class_level, None) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let entries: Vec<RankEntry> = rows
        .iter()
        .map(|r| RankEntry {
            student_id: r.summary.student_id.clone(),
            score: r.summary.average,
        })
        .collect();
    let ranked = rank::rank(&entries);

    let top: Vec<serde_json::Value> = ranked
        .iter()
        .take(limit as usize)
        .map(|entry| {
            let row = rows
                .iter()
                .find(|r| r.summary.student_id == entry.student_id);
            json!({
                "studentId": entry.student_id,
                "displayName": row.map(|r| r.display_name.clone()),
                "admissionNo": row.map(|r| r.admission_no.clone()),
                "average": entry.score,
                "meanGrade": row.map(|r| r.summary.mean_grade),
                "position": entry.position,
            })
        })
        .collect();
    ok(
        &req.id,
        json!({
            "termId": term_id,
            "classLevel": class_level,
            "performers": top,
        }),
    )
}

/// Per-subject ranking by marks. A student sitting the subject in more than
/// one exam of the term counts once with their best mark, which keeps the
/// output independent of row order.
fn handle_subject_ranking(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let term_id = match required_str(req, "termId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let class_level = opt_i64(req, "classLevel");

    if let Err(e) = db::fetch_term(conn, &term_id) {
        return engine_err(&req.id, &e);
    }
    if let Err(e) = db::fetch_subject(conn, &subject_id) {
        return engine_err(&req.id, &e);
    }

    let mut sql = String::from(
        "SELECT r.student_id, s.last_name, s.first_name, s.admission_no, MAX(r.marks)
         FROM results r
         JOIN exams e ON r.exam_id = e.id
         JOIN students s ON r.student_id = s.id
         WHERE e.term_id = ? AND r.subject_id = ? AND s.active = 1",
    );
    let mut values: Vec<rusqlite::types::Value> = vec![
        rusqlite::types::Value::Text(term_id.clone()),
        rusqlite::types::Value::Text(subject_id.clone()),
    ];
    if let Some(level) = class_level {
        sql.push_str(" AND s.class_level = ?");
        values.push(rusqlite::types::Value::Integer(level));
    }
    sql.push_str(" GROUP BY r.student_id");

    struct SubjectMark {
        student_id: String,
        display_name: String,
        admission_no: String,
        marks: i64,
    }
    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(values), |r| {
            let last: String = r.get(1)?;
            let first: String = r.get(2)?;
            Ok(SubjectMark {
                student_id: r.get(0)?,
                display_name: format!("{}, {}", last, first),
                admission_no: r.get(3)?,
                marks: r.get(4)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    let rows = match rows {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let entries: Vec<RankEntry> = rows
        .iter()
        .map(|r| RankEntry {
            student_id: r.student_id.clone(),
            score: r.marks as f64,
        })
        .collect();
    let ranked = rank::rank(&entries);

    let out: Vec<serde_json::Value> = ranked
        .iter()
        .map(|entry| {
            let row = rows.iter().find(|r| r.student_id == entry.student_id);
            json!({
                "studentId": entry.student_id,
                "displayName": row.map(|r| r.display_name.clone()),
                "admissionNo": row.map(|r| r.admission_no.clone()),
                "marks": entry.score as i64,
                "position": entry.position,
            })
        })
        .collect();
    ok(
        &req.id,
        json!({
            "termId": term_id,
            "subjectId": subject_id,
            "ranking": out,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.subject.performance" => Some(handle_subject_performance(state, req)),
        "analytics.class.performance" => Some(handle_class_performance(state, req)),
        "analytics.streams.compare" => Some(handle_streams_compare(state, req)),
        "analytics.gender.gap" => Some(handle_gender_gap(state, req)),
        "analytics.student.trend" => Some(handle_student_trend(state, req)),
        "analytics.top.performers" => Some(handle_top_performers(state, req)),
        "analytics.subject.ranking" => Some(handle_subject_ranking(state, req)),
        _ => None,
    }
}
