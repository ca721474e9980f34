use crate::db;
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{db_conn, opt_i64, opt_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::rank::{self, RankEntry, SubjectScore, TermSummary};
use rayon::prelude::*;
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};

struct CohortOutcome {
    class_level: i64,
    stream: String,
    summaries: Vec<TermSummary>,
    stream_positions: HashMap<String, i64>,
}

/// Batch recompute for one term: rebuild every scoped student's TermSummary
/// and assign positions per cohort scope. Everything is computed from the
/// raw results before a single row is written, then persisted in one
/// transaction, so an abandoned run leaves storage untouched.
///
/// Optional classLevel/stream narrowing limits which summaries are rebuilt.
/// The cross-stream class scope needs every stream of a level and the
/// school-wide scope needs every level, so those passes only run when the
/// invocation is not narrowed past them.
fn handle_recompute_term(state: &mut AppState, req: &Request) -> serde_json::Value {
    let term_id = match required_str(req, "termId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let class_level = opt_i64(req, "classLevel");
    let stream = opt_str(req, "stream");

    {
        let conn = match db_conn(state, req) {
            Ok(c) => c,
            Err(resp) => return resp,
        };
        if let Err(e) = db::fetch_term(conn, &term_id) {
            return engine_err(&req.id, &e);
        }
    }

    // Read phase: scoped active students and their raw term results.
    let (students, scores_by_student) = {
        let conn = match db_conn(state, req) {
            Ok(c) => c,
            Err(resp) => return resp,
        };
        let students =
            match db::fetch_students_in_cohort(conn, class_level, stream.as_deref()) {
                Ok(v) => v,
                Err(e) => return engine_err(&req.id, &e),
            };

        let mut stmt = match conn.prepare(
            "SELECT r.student_id, r.marks, r.points
             FROM results r
             JOIN exams e ON r.exam_id = e.id
             WHERE e.term_id = ?",
        ) {
            Ok(s) => s,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        let rows = stmt
            .query_map([&term_id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    SubjectScore {
                        marks: r.get(1)?,
                        points: r.get(2)?,
                    },
                ))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>());
        let rows = match rows {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };

        let scoped: HashSet<&str> = students.iter().map(|s| s.id.as_str()).collect();
        let mut scores_by_student: HashMap<String, Vec<SubjectScore>> = HashMap::new();
        for (student_id, score) in rows {
            if scoped.contains(student_id.as_str()) {
                scores_by_student.entry(student_id).or_default().push(score);
            }
        }
        (students, scores_by_student)
    };

    if students.is_empty() {
        // Not an error: there is simply nobody to rank in this scope.
        return ok(
            &req.id,
            json!({
                "termId": term_id,
                "studentsSummarized": 0,
                "cohorts": [],
                "scopesComputed": [],
                "noEligibleStudents": true,
            }),
        );
    }

    // BTreeMap keeps cohort iteration order deterministic.
    let mut cohorts: BTreeMap<(i64, String), Vec<&db::StudentRow>> = BTreeMap::new();
    for s in &students {
        cohorts
            .entry((s.class_level, s.stream.clone()))
            .or_default()
            .push(s);
    }
    let cohort_list: Vec<((i64, String), Vec<&db::StudentRow>)> = cohorts.into_iter().collect();

    // Fan out one task per (class level, stream). Cohorts are independent:
    // each task reads the shared score map and produces only its own
    // summaries and in-stream positions.
    let outcomes: Vec<CohortOutcome> = cohort_list
        .par_iter()
        .map(|((level, stream_name), members)| {
            let mut summaries: Vec<TermSummary> = Vec::new();
            for member in members {
                let Some(scores) = scores_by_student.get(&member.id) else {
                    continue;
                };
                if let Some(summary) = rank::summarize(&member.id, &term_id, scores) {
                    summaries.push(summary);
                }
            }
            let entries: Vec<RankEntry> = summaries
                .iter()
                .map(|s| RankEntry {
                    student_id: s.student_id.clone(),
                    score: s.average,
                })
                .collect();
            let stream_positions = rank::positions_by_student(&rank::rank(&entries));
            log::debug!(
                "cohort {}/{}: {} summarized of {} students",
                level,
                stream_name,
                summaries.len(),
                members.len()
            );
            CohortOutcome {
                class_level: *level,
                stream: stream_name.clone(),
                summaries,
                stream_positions,
            }
        })
        .collect();

    // Join pass: the wider scopes need every cohort's summaries assembled.
    let mut scopes_computed = vec!["stream"];
    let mut class_positions: HashMap<String, i64> = HashMap::new();
    let mut overall_positions: HashMap<String, i64> = HashMap::new();

    if stream.is_none() {
        scopes_computed.push("class");
        let mut by_level: BTreeMap<i64, Vec<RankEntry>> = BTreeMap::new();
        for outcome in &outcomes {
            for s in &outcome.summaries {
                by_level
                    .entry(outcome.class_level)
                    .or_default()
                    .push(RankEntry {
                        student_id: s.student_id.clone(),
                        score: s.average,
                    });
            }
        }
        for entries in by_level.values() {
            class_positions.extend(rank::positions_by_student(&rank::rank(entries)));
        }
    }
    if stream.is_none() && class_level.is_none() {
        scopes_computed.push("overall");
        let entries: Vec<RankEntry> = outcomes
            .iter()
            .flat_map(|o| o.summaries.iter())
            .map(|s| RankEntry {
                student_id: s.student_id.clone(),
                score: s.average,
            })
            .collect();
        overall_positions = rank::positions_by_student(&rank::rank(&entries));
    }

    let summarized_ids: HashSet<&str> = outcomes
        .iter()
        .flat_map(|o| o.summaries.iter())
        .map(|s| s.student_id.as_str())
        .collect();
    let students_summarized = summarized_ids.len();

    // Write phase: wholesale replacement inside one transaction.
    let conn = match state.db.as_mut() {
        Some(c) => c,
        None => return err(&req.id, "no_workspace", "select a workspace first", None),
    };
    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let now = db::now_rfc3339();

    for outcome in &outcomes {
        for summary in &outcome.summaries {
            let written = tx.execute(
                "INSERT INTO result_summaries(
                    student_id, term_id, total_marks, average, mean_grade,
                    total_points, subjects_taken, position_in_stream, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(student_id, term_id) DO UPDATE SET
                    total_marks = excluded.total_marks,
                    average = excluded.average,
                    mean_grade = excluded.mean_grade,
                    total_points = excluded.total_points,
                    subjects_taken = excluded.subjects_taken,
                    position_in_stream = excluded.position_in_stream,
                    updated_at = excluded.updated_at",
                (
                    &summary.student_id,
                    &term_id,
                    summary.total_marks,
                    summary.average,
                    summary.mean_grade.as_str(),
                    summary.total_points,
                    summary.subjects_taken as i64,
                    outcome.stream_positions.get(&summary.student_id).copied(),
                    &now,
                ),
            );
            if let Err(e) = written {
                return err(&req.id, "db_query_failed", e.to_string(), None);
            }
        }
    }

    if scopes_computed.contains(&"class") {
        for (student_id, position) in &class_positions {
            let updated = tx.execute(
                "UPDATE result_summaries SET position_in_class = ?
                 WHERE student_id = ? AND term_id = ?",
                (*position, student_id, &term_id),
            );
            if let Err(e) = updated {
                return err(&req.id, "db_query_failed", e.to_string(), None);
            }
        }
    }
    if scopes_computed.contains(&"overall") {
        for (student_id, position) in &overall_positions {
            let updated = tx.execute(
                "UPDATE result_summaries SET position_overall = ?
                 WHERE student_id = ? AND term_id = ?",
                (*position, student_id, &term_id),
            );
            if let Err(e) = updated {
                return err(&req.id, "db_query_failed", e.to_string(), None);
            }
        }
    }

    // Scoped students whose last result for the term was removed must lose
    // their summary entirely; "no results" is never a row of zeros.
    for student in &students {
        if summarized_ids.contains(student.id.as_str()) {
            continue;
        }
        let deleted = tx.execute(
            "DELETE FROM result_summaries WHERE student_id = ? AND term_id = ?",
            (&student.id, &term_id),
        );
        if let Err(e) = deleted {
            return err(&req.id, "db_query_failed", e.to_string(), None);
        }
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_query_failed", e.to_string(), None);
    }

    log::info!(
        "recomputed term {}: {} students across {} cohorts (scopes: {})",
        term_id,
        students_summarized,
        outcomes.len(),
        scopes_computed.join(",")
    );

    let cohort_report: Vec<serde_json::Value> = outcomes
        .iter()
        .map(|o| {
            json!({
                "classLevel": o.class_level,
                "stream": o.stream,
                "studentsSummarized": o.summaries.len(),
            })
        })
        .collect();
    ok(
        &req.id,
        json!({
            "termId": term_id,
            "studentsSummarized": students_summarized,
            "cohorts": cohort_report,
            "scopesComputed": scopes_computed,
            "noEligibleStudents": students_summarized == 0,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "recompute.term" => Some(handle_recompute_term(state, req)),
        _ => None,
    }
}
