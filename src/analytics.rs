use serde::Serialize;

use crate::grading::{Grade, GRADE_BOUNDARIES};
use crate::rank::{round_off_2_decimals, TermSummary};

/// Mean/max/min and pass rate for one subject's marks. The pass threshold is
/// the subject's configured pass mark, threaded in by the caller rather than
/// a hardcoded 50.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStatistics {
    pub mean: f64,
    pub max: i64,
    pub min: i64,
    pub pass_rate: f64,
    pub total_students: usize,
}

pub fn subject_statistics(marks: &[i64], pass_mark: i64) -> Option<SubjectStatistics> {
    if marks.is_empty() {
        return None;
    }
    let total: i64 = marks.iter().sum();
    let max = marks.iter().copied().max().unwrap_or(0);
    let min = marks.iter().copied().min().unwrap_or(0);
    let passed = marks.iter().filter(|m| **m >= pass_mark).count();
    Some(SubjectStatistics {
        mean: round_off_2_decimals(total as f64 / marks.len() as f64),
        max,
        min,
        pass_rate: round_off_2_decimals(passed as f64 / marks.len() as f64 * 100.0),
        total_students: marks.len(),
    })
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GradeBucket {
    pub grade: Grade,
    pub count: usize,
}

/// Cohort-level rollup of term summaries: score statistics, a histogram over
/// mean grades, and the four fixed performance bands.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassPerformance {
    pub total_students: usize,
    pub mean_score: f64,
    pub max_score: f64,
    pub min_score: f64,
    pub grade_distribution: Vec<GradeBucket>,
    pub excellent: usize,
    pub good: usize,
    pub fair: usize,
    pub poor: usize,
    pub excellent_percentage: f64,
}

pub fn class_performance(summaries: &[TermSummary]) -> Option<ClassPerformance> {
    if summaries.is_empty() {
        return None;
    }

    let averages: Vec<f64> = summaries.iter().map(|s| s.average).collect();
    let total: f64 = averages.iter().sum();
    let max_score = averages.iter().copied().fold(f64::MIN, f64::max);
    let min_score = averages.iter().copied().fold(f64::MAX, f64::min);

    // Histogram over mean grades, in table order, empty buckets skipped.
    let mut grade_distribution: Vec<GradeBucket> = Vec::new();
    for (_, grade, _) in GRADE_BOUNDARIES {
        let count = summaries.iter().filter(|s| s.mean_grade == grade).count();
        if count > 0 {
            grade_distribution.push(GradeBucket { grade, count });
        }
    }

    // Fixed performance bands: excellent >=80, good [70,80), fair [50,70),
    // poor <50.
    let excellent = averages.iter().filter(|a| **a >= 80.0).count();
    let good = averages.iter().filter(|a| **a >= 70.0 && **a < 80.0).count();
    let fair = averages.iter().filter(|a| **a >= 50.0 && **a < 70.0).count();
    let poor = averages.iter().filter(|a| **a < 50.0).count();

    Some(ClassPerformance {
        total_students: summaries.len(),
        mean_score: round_off_2_decimals(total / summaries.len() as f64),
        max_score,
        min_score,
        grade_distribution,
        excellent,
        good,
        fair,
        poor,
        excellent_percentage: round_off_2_decimals(
            excellent as f64 / summaries.len() as f64 * 100.0,
        ),
    })
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopStudent {
    pub student_id: String,
    pub average: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamPerformance {
    pub stream: String,
    pub average: f64,
    pub count: usize,
    pub top_student: TopStudent,
}

/// Compare streams within one class level: per-stream mean average and the
/// top-scoring student (ties broken by student id for reproducibility).
/// Streams with no summaries are omitted.
pub fn compare_streams(by_stream: &[(String, Vec<TermSummary>)]) -> Vec<StreamPerformance> {
    let mut out = Vec::new();
    for (stream, summaries) in by_stream {
        if summaries.is_empty() {
            continue;
        }
        let total: f64 = summaries.iter().map(|s| s.average).sum();
        let mut top = &summaries[0];
        for s in &summaries[1..] {
            if s.average > top.average
                || (s.average == top.average && s.student_id < top.student_id)
            {
                top = s;
            }
        }
        out.push(StreamPerformance {
            stream: stream.clone(),
            average: round_off_2_decimals(total / summaries.len() as f64),
            count: summaries.len(),
            top_student: TopStudent {
                student_id: top.student_id.clone(),
                average: top.average,
            },
        });
    }
    out
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenderBreakdown {
    pub gender: String,
    pub mean_average: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenderGap {
    pub breakdown: Vec<GenderBreakdown>,
    pub gap: f64,
}

/// Mean average and count per gender plus the absolute difference of the two
/// means. With fewer than two genders represented, the gap is 0.
pub fn gender_gap(rows: &[(String, f64)]) -> Option<GenderGap> {
    if rows.is_empty() {
        return None;
    }

    let mut genders: Vec<String> = rows.iter().map(|(g, _)| g.clone()).collect();
    genders.sort();
    genders.dedup();

    let mut breakdown = Vec::new();
    for gender in genders {
        let averages: Vec<f64> = rows
            .iter()
            .filter(|(g, _)| *g == gender)
            .map(|(_, a)| *a)
            .collect();
        let total: f64 = averages.iter().sum();
        breakdown.push(GenderBreakdown {
            gender,
            mean_average: round_off_2_decimals(total / averages.len() as f64),
            count: averages.len(),
        });
    }

    let gap = if breakdown.len() >= 2 {
        round_off_2_decimals((breakdown[0].mean_average - breakdown[1].mean_average).abs())
    } else {
        0.0
    };

    Some(GenderGap { breakdown, gap })
}

/// Read-only projection of one TermSummary for trend display.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub term_label: String,
    pub average: f64,
    pub mean_grade: Grade,
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendReport {
    pub points: Vec<TrendPoint>,
    pub improvement: f64,
    pub best_term: String,
    pub worst_term: String,
}

/// Trend over a student's most recent terms. `points` must be ordered
/// newest-first; improvement is newest minus the oldest point in the window
/// (the Nth item, not necessarily the student's true first term).
pub fn student_trend(points: Vec<TrendPoint>) -> Option<TrendReport> {
    if points.is_empty() {
        return None;
    }

    let improvement = if points.len() >= 2 {
        round_off_2_decimals(points[0].average - points[points.len() - 1].average)
    } else {
        0.0
    };

    let mut best = &points[0];
    let mut worst = &points[0];
    for p in &points[1..] {
        if p.average > best.average {
            best = p;
        }
        if p.average < worst.average {
            worst = p;
        }
    }

    let best_term = best.term_label.clone();
    let worst_term = worst.term_label.clone();
    Some(TrendReport {
        improvement,
        best_term,
        worst_term,
        points,
    })
}
