use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::grading::{self, Grade};

/// 2-decimal rounding applied to every stored or compared average so that
/// ranking ties are decided on the same value the host displays.
pub fn round_off_2_decimals(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

/// One subject result reduced to the fields the aggregator needs.
#[derive(Debug, Clone, Copy)]
pub struct SubjectScore {
    pub marks: i64,
    pub points: i64,
}

/// Per-student, per-term rollup of all subject results. Recomputation fully
/// replaces prior values; positions are assigned by a separate ranking pass.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TermSummary {
    pub student_id: String,
    pub term_id: String,
    pub total_marks: i64,
    pub average: f64,
    pub mean_grade: Grade,
    pub total_points: i64,
    pub subjects_taken: usize,
}

/// Collapse a student's subject results for one term into a summary.
/// Returns `None` for an empty result set: "not yet examined this term" is
/// not the same as a summary full of zeros, and such students must never
/// appear in a ranking.
pub fn summarize(student_id: &str, term_id: &str, results: &[SubjectScore]) -> Option<TermSummary> {
    if results.is_empty() {
        return None;
    }

    let total_marks: i64 = results.iter().map(|r| r.marks).sum();
    let total_points: i64 = results.iter().map(|r| r.points).sum();
    let subjects_taken = results.len();

    // Unweighted mean across subjects; a 50-mark subject counts the same as
    // a 100-mark one. Deliberately preserved source behavior.
    let average = round_off_2_decimals(total_marks as f64 / subjects_taken as f64);
    let mean_points = total_points as f64 / subjects_taken as f64;
    let (mean_grade, _) = grading::grade_for_mean_points(mean_points);

    Some(TermSummary {
        student_id: student_id.to_string(),
        term_id: term_id.to_string(),
        total_marks,
        average,
        mean_grade,
        total_points,
        subjects_taken,
    })
}

#[derive(Debug, Clone)]
pub struct RankEntry {
    pub student_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    pub student_id: String,
    pub score: f64,
    pub position: i64,
}

/// Competition ranking over one cohort's entries: ties share the better
/// position and the next strictly-lower score takes its 1-based index, so
/// positions can skip past a block of ties ([90, 90, 85] -> [1, 1, 3]).
///
/// Sort order is score descending with student id ascending as an explicit
/// secondary key; without it, the order of tied entries (and therefore the
/// output) would depend on input order.
pub fn rank(entries: &[RankEntry]) -> Vec<RankedEntry> {
    let mut sorted: Vec<RankEntry> = entries.to_vec();
    sorted.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.student_id.cmp(&b.student_id))
    });

    let mut out: Vec<RankedEntry> = Vec::with_capacity(sorted.len());
    let mut current_position: i64 = 1;
    let mut previous_score: Option<f64> = None;

    for (i, entry) in sorted.into_iter().enumerate() {
        if let Some(prev) = previous_score {
            if entry.score < prev {
                current_position = (i + 1) as i64;
            }
        }
        previous_score = Some(entry.score);
        out.push(RankedEntry {
            student_id: entry.student_id,
            score: entry.score,
            position: current_position,
        });
    }
    out
}

pub fn positions_by_student(ranked: &[RankedEntry]) -> HashMap<String, i64> {
    ranked
        .iter()
        .map(|r| (r.student_id.clone(), r.position))
        .collect()
}
