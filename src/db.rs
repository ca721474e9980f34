use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::error::EngineError;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("shule.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS terms(
            id TEXT PRIMARY KEY,
            academic_year TEXT NOT NULL,
            term INTEGER NOT NULL,
            label TEXT NOT NULL,
            UNIQUE(academic_year, term)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            max_mark INTEGER NOT NULL DEFAULT 100,
            pass_mark INTEGER NOT NULL DEFAULT 40,
            active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            admission_no TEXT NOT NULL UNIQUE,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            gender TEXT NOT NULL,
            class_level INTEGER NOT NULL,
            stream TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_cohort ON students(class_level, stream)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exams(
            id TEXT PRIMARY KEY,
            term_id TEXT NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'endterm',
            FOREIGN KEY(term_id) REFERENCES terms(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exams_term ON exams(term_id)",
        [],
    )?;

    // grade and points are always written together with marks; at most one
    // live result per (student, exam, subject).
    conn.execute(
        "CREATE TABLE IF NOT EXISTS results(
            student_id TEXT NOT NULL,
            exam_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            marks INTEGER NOT NULL,
            grade TEXT NOT NULL,
            points INTEGER NOT NULL,
            remarks TEXT NOT NULL,
            updated_at TEXT,
            PRIMARY KEY(student_id, exam_id, subject_id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(exam_id) REFERENCES exams(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_exam ON results(exam_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_subject ON results(subject_id)",
        [],
    )?;

    // Position columns per ranking scope: in_stream = class level + stream,
    // in_class = class level across streams, overall = school-wide.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS result_summaries(
            student_id TEXT NOT NULL,
            term_id TEXT NOT NULL,
            total_marks INTEGER NOT NULL,
            average REAL NOT NULL,
            mean_grade TEXT NOT NULL,
            total_points INTEGER NOT NULL,
            subjects_taken INTEGER NOT NULL,
            position_in_class INTEGER,
            position_in_stream INTEGER,
            position_overall INTEGER,
            updated_at TEXT,
            PRIMARY KEY(student_id, term_id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(term_id) REFERENCES terms(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_summaries_term ON result_summaries(term_id)",
        [],
    )?;

    Ok(conn)
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[derive(Debug, Clone)]
pub struct SubjectRow {
    pub id: String,
    pub code: String,
    pub name: String,
    pub max_mark: i64,
    pub pass_mark: i64,
}

pub fn fetch_subject(conn: &Connection, subject_id: &str) -> Result<SubjectRow, EngineError> {
    conn.query_row(
        "SELECT id, code, name, max_mark, pass_mark FROM subjects WHERE id = ?",
        [subject_id],
        |r| {
            Ok(SubjectRow {
                id: r.get(0)?,
                code: r.get(1)?,
                name: r.get(2)?,
                max_mark: r.get(3)?,
                pass_mark: r.get(4)?,
            })
        },
    )
    .optional()?
    .ok_or(EngineError::NotFound("subject"))
}

#[derive(Debug, Clone)]
pub struct TermRow {
    pub id: String,
    pub academic_year: String,
    pub term: i64,
    pub label: String,
}

pub fn fetch_term(conn: &Connection, term_id: &str) -> Result<TermRow, EngineError> {
    conn.query_row(
        "SELECT id, academic_year, term, label FROM terms WHERE id = ?",
        [term_id],
        |r| {
            Ok(TermRow {
                id: r.get(0)?,
                academic_year: r.get(1)?,
                term: r.get(2)?,
                label: r.get(3)?,
            })
        },
    )
    .optional()?
    .ok_or(EngineError::NotFound("term"))
}

#[derive(Debug, Clone)]
pub struct StudentRow {
    pub id: String,
    pub admission_no: String,
    pub last_name: String,
    pub first_name: String,
    pub gender: String,
    pub class_level: i64,
    pub stream: String,
}

impl StudentRow {
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

pub fn fetch_student(conn: &Connection, student_id: &str) -> Result<StudentRow, EngineError> {
    conn.query_row(
        "SELECT id, admission_no, last_name, first_name, gender, class_level, stream
         FROM students
         WHERE id = ?",
        [student_id],
        |r| {
            Ok(StudentRow {
                id: r.get(0)?,
                admission_no: r.get(1)?,
                last_name: r.get(2)?,
                first_name: r.get(3)?,
                gender: r.get(4)?,
                class_level: r.get(5)?,
                stream: r.get(6)?,
            })
        },
    )
    .optional()?
    .ok_or(EngineError::NotFound("student"))
}

/// Active students in a cohort scope, independent of whether they have any
/// results yet. Both narrowing keys are optional.
pub fn fetch_students_in_cohort(
    conn: &Connection,
    class_level: Option<i64>,
    stream: Option<&str>,
) -> Result<Vec<StudentRow>, EngineError> {
    let mut sql = String::from(
        "SELECT id, admission_no, last_name, first_name, gender, class_level, stream
         FROM students
         WHERE active = 1",
    );
    let mut values: Vec<rusqlite::types::Value> = Vec::new();
    if let Some(level) = class_level {
        sql.push_str(" AND class_level = ?");
        values.push(rusqlite::types::Value::Integer(level));
    }
    if let Some(stream) = stream {
        sql.push_str(" AND stream = ?");
        values.push(rusqlite::types::Value::Text(stream.to_string()));
    }
    sql.push_str(" ORDER BY class_level, stream, admission_no");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(values), |r| {
            Ok(StudentRow {
                id: r.get(0)?,
                admission_no: r.get(1)?,
                last_name: r.get(2)?,
                first_name: r.get(3)?,
                gender: r.get(4)?,
                class_level: r.get(5)?,
                stream: r.get(6)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows)
}
