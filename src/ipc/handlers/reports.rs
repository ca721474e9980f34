use crate::db;
use crate::error::EngineError;
use crate::grading;
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::rank::round_off_2_decimals;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

struct SubjectLine {
    subject_name: String,
    subject_code: String,
    marks: i64,
    grade: String,
    points: i64,
    remarks: String,
}

struct SummaryLine {
    average: f64,
    mean_grade: String,
    position_in_class: Option<i64>,
    position_in_stream: Option<i64>,
    position_overall: Option<i64>,
}

/// Report-card data for one student and term, or `None` when the student
/// has no results in the term.
fn build_term_report(
    conn: &Connection,
    student: &db::StudentRow,
    term: &db::TermRow,
) -> Result<Option<serde_json::Value>, EngineError> {
    let mut stmt = conn.prepare(
        "SELECT sub.name, sub.code, r.marks, r.grade, r.points, r.remarks
         FROM results r
         JOIN exams e ON r.exam_id = e.id
         JOIN subjects sub ON r.subject_id = sub.id
         WHERE r.student_id = ? AND e.term_id = ?
         ORDER BY sub.name, r.exam_id",
    )?;
    let lines: Vec<SubjectLine> = stmt
        .query_map((&student.id, &term.id), |r| {
            Ok(SubjectLine {
                subject_name: r.get(0)?,
                subject_code: r.get(1)?,
                marks: r.get(2)?,
                grade: r.get(3)?,
                points: r.get(4)?,
                remarks: r.get(5)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    if lines.is_empty() {
        return Ok(None);
    }

    let total_marks: i64 = lines.iter().map(|l| l.marks).sum();
    let total_points: i64 = lines.iter().map(|l| l.points).sum();

    let summary: Option<SummaryLine> = conn
        .query_row(
            "SELECT average, mean_grade, position_in_class, position_in_stream, position_overall
             FROM result_summaries
             WHERE student_id = ? AND term_id = ?",
            (&student.id, &term.id),
            |r| {
                Ok(SummaryLine {
                    average: r.get(0)?,
                    mean_grade: r.get(1)?,
                    position_in_class: r.get(2)?,
                    position_in_stream: r.get(3)?,
                    position_overall: r.get(4)?,
                })
            },
        )
        .optional()?;

    // Without a recomputed summary the averages are derived on the fly;
    // positions stay null until a ranking pass has run.
    let summary = summary.unwrap_or_else(|| {
        let average = round_off_2_decimals(total_marks as f64 / lines.len() as f64);
        let (mean_grade, _) = grading::grade_for_marks(average);
        SummaryLine {
            average,
            mean_grade: mean_grade.as_str().to_string(),
            position_in_class: None,
            position_in_stream: None,
            position_overall: None,
        }
    });

    let subjects: Vec<serde_json::Value> = lines
        .iter()
        .map(|l| {
            json!({
                "subject": l.subject_name,
                "code": l.subject_code,
                "marks": l.marks,
                "grade": l.grade,
                "points": l.points,
                "remarks": l.remarks,
            })
        })
        .collect();

    Ok(Some(json!({
        "student": {
            "id": student.id,
            "admissionNo": student.admission_no,
            "displayName": student.display_name(),
            "classLabel": format!("Form {} {}", student.class_level, student.stream),
        },
        "term": { "id": term.id, "label": term.label },
        "subjects": subjects,
        "totalMarks": total_marks,
        "totalPoints": total_points,
        "subjectsTaken": lines.len(),
        "average": summary.average,
        "meanGrade": summary.mean_grade,
        "positionInClass": summary.position_in_class,
        "positionInStream": summary.position_in_stream,
        "positionOverall": summary.position_overall,
    })))
}

fn handle_report_term(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let term_id = match required_str(req, "termId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let student = match db::fetch_student(conn, &student_id) {
        Ok(s) => s,
        Err(e) => return engine_err(&req.id, &e),
    };
    let term = match db::fetch_term(conn, &term_id) {
        Ok(t) => t,
        Err(e) => return engine_err(&req.id, &e),
    };

    match build_term_report(conn, &student, &term) {
        Ok(Some(report)) => ok(&req.id, json!({ "report": report })),
        Ok(None) => err(
            &req.id,
            "not_found",
            "student has no results for this term",
            None,
        ),
        Err(e) => engine_err(&req.id, &e),
    }
}

/// Annual report: one term report per examined term of the year, with the
/// annual average taken as the mean of term averages.
fn handle_report_annual(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let academic_year = match required_str(req, "academicYear") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let student = match db::fetch_student(conn, &student_id) {
        Ok(s) => s,
        Err(e) => return engine_err(&req.id, &e),
    };

    let terms: Result<Vec<db::TermRow>, _> = conn
        .prepare(
            "SELECT id, academic_year, term, label FROM terms
             WHERE academic_year = ?
             ORDER BY term",
        )
        .and_then(|mut stmt| {
            stmt.query_map([&academic_year], |r| {
                Ok(db::TermRow {
                    id: r.get(0)?,
                    academic_year: r.get(1)?,
                    term: r.get(2)?,
                    label: r.get(3)?,
                })
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        });
    let terms = match terms {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if terms.is_empty() {
        return err(&req.id, "not_found", "no terms for academic year", None);
    }

    let mut term_reports: Vec<serde_json::Value> = Vec::new();
    let mut term_averages: Vec<f64> = Vec::new();
    let mut annual_total_points: i64 = 0;
    for term in &terms {
        match build_term_report(conn, &student, term) {
            Ok(Some(report)) => {
                if let Some(avg) = report.get("average").and_then(|v| v.as_f64()) {
                    term_averages.push(avg);
                }
                annual_total_points += report
                    .get("totalPoints")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0);
                term_reports.push(report);
            }
            Ok(None) => {}
            Err(e) => return engine_err(&req.id, &e),
        }
    }
    if term_reports.is_empty() {
        return err(
            &req.id,
            "not_found",
            "student has no results in this academic year",
            None,
        );
    }

    let annual_average = round_off_2_decimals(
        term_averages.iter().sum::<f64>() / term_averages.len() as f64,
    );
    let (annual_mean_grade, _) = grading::grade_for_marks(annual_average);

    ok(
        &req.id,
        json!({
            "student": {
                "id": student.id,
                "admissionNo": student.admission_no,
                "displayName": student.display_name(),
            },
            "academicYear": academic_year,
            "termReports": term_reports,
            "annualAverage": annual_average,
            "annualMeanGrade": annual_mean_grade.as_str(),
            "annualTotalPoints": annual_total_points,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "report.term" => Some(handle_report_term(state, req)),
        "report.annual" => Some(handle_report_annual(state, req)),
        _ => None,
    }
}
