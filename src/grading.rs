use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Letter grades of the 8-4-4 scale, ordered best to worst. Each grade
/// carries a fixed point value from 12 down to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "D+")]
    DPlus,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D-")]
    DMinus,
    #[serde(rename = "E")]
    E,
}

impl Grade {
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::AMinus => "A-",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::BMinus => "B-",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::CMinus => "C-",
            Grade::DPlus => "D+",
            Grade::D => "D",
            Grade::DMinus => "D-",
            Grade::E => "E",
        }
    }

    pub fn parse(s: &str) -> Option<Grade> {
        match s {
            "A" => Some(Grade::A),
            "A-" => Some(Grade::AMinus),
            "B+" => Some(Grade::BPlus),
            "B" => Some(Grade::B),
            "B-" => Some(Grade::BMinus),
            "C+" => Some(Grade::CPlus),
            "C" => Some(Grade::C),
            "C-" => Some(Grade::CMinus),
            "D+" => Some(Grade::DPlus),
            "D" => Some(Grade::D),
            "D-" => Some(Grade::DMinus),
            "E" => Some(Grade::E),
            _ => None,
        }
    }

    pub fn points(self) -> i64 {
        match self {
            Grade::A => 12,
            Grade::AMinus => 11,
            Grade::BPlus => 10,
            Grade::B => 9,
            Grade::BMinus => 8,
            Grade::CPlus => 7,
            Grade::C => 6,
            Grade::CMinus => 5,
            Grade::DPlus => 4,
            Grade::D => 3,
            Grade::DMinus => 2,
            Grade::E => 1,
        }
    }
}

/// The grade boundary table: (mark threshold, grade, points), sorted by
/// threshold descending with points descending in lock-step. The final row
/// at threshold 0 is the catch-all, so a scan can never miss.
///
/// The same table serves two input axes: raw marks (0-100) are matched
/// against the threshold column, and mean points (1-12) against the points
/// column. Both axes decrease together, so either scan is well-defined.
pub const GRADE_BOUNDARIES: [(i64, Grade, i64); 12] = [
    (80, Grade::A, 12),
    (75, Grade::AMinus, 11),
    (70, Grade::BPlus, 10),
    (65, Grade::B, 9),
    (60, Grade::BMinus, 8),
    (55, Grade::CPlus, 7),
    (50, Grade::C, 6),
    (45, Grade::CMinus, 5),
    (40, Grade::DPlus, 4),
    (35, Grade::D, 3),
    (30, Grade::DMinus, 2),
    (0, Grade::E, 1),
];

/// Map marks to (grade, points). Total for any marks >= 0; marks of exactly
/// 0 land on the E/1 catch-all row, never "no grade".
pub fn grade_for_marks(marks: f64) -> (Grade, i64) {
    for (threshold, grade, points) in GRADE_BOUNDARIES {
        if marks >= threshold as f64 {
            return (grade, points);
        }
    }
    (Grade::E, 1)
}

/// Map a mean point value (total points / subjects taken) back through the
/// same table, comparing against the points column. Defaults to E when the
/// mean falls below 1.
pub fn grade_for_mean_points(mean_points: f64) -> (Grade, i64) {
    for (_, grade, points) in GRADE_BOUNDARIES {
        if mean_points >= points as f64 {
            return (grade, points);
        }
    }
    (Grade::E, 1)
}

/// Derive the (grade, points) pair for a raw mark. Marks outside
/// [0, subject max] are rejected, not clamped: a clamp would desynchronize
/// the stored mark from what was actually entered.
pub fn derive_result(marks: i64, subject_max_mark: i64) -> Result<(Grade, i64), EngineError> {
    if marks < 0 || marks > subject_max_mark {
        return Err(EngineError::InvalidMark {
            marks,
            max_mark: subject_max_mark,
        });
    }
    Ok(grade_for_marks(marks as f64))
}

/// Canonical remark for a grade band, used when marks entry supplies none.
pub fn remark_for_grade(grade: Grade) -> &'static str {
    match grade {
        Grade::A | Grade::AMinus => "Excellent",
        Grade::BPlus | Grade::B => "Very Good",
        Grade::BMinus | Grade::CPlus => "Good",
        Grade::C | Grade::CMinus => "Average",
        Grade::DPlus | Grade::D => "Below Average",
        Grade::DMinus | Grade::E => "Needs Improvement",
    }
}
