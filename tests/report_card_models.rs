mod test_support;

use serde_json::json;
use test_support::{
    create_student, enter_mark, request_ok, seed_basic_academics, spawn_sidecar, temp_dir,
};

#[test]
fn term_and_annual_reports_assemble_result_rows() {
    let workspace = temp_dir("shuled-report-cards");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (term1, exam1, subjects) = seed_basic_academics(&mut stdin, &mut reader, &workspace);
    let (math, eng) = (subjects[0].clone(), subjects[1].clone());

    let term2 = request_ok(
        &mut stdin,
        &mut reader,
        "t2",
        "terms.create",
        json!({ "academicYear": "2026", "term": 2 }),
    );
    let term2_id = term2["termId"].as_str().expect("termId").to_string();
    let exam2 = request_ok(
        &mut stdin,
        &mut reader,
        "e2",
        "exams.create",
        json!({ "termId": term2_id, "name": "End of Term 2" }),
    );
    let exam2_id = exam2["examId"].as_str().expect("examId").to_string();

    let student = create_student(
        &mut stdin,
        &mut reader,
        "s1",
        "ADM001",
        ("Akinyi", "Onyango"),
        "F",
        2,
        "North",
    );

    // Term 1: MAT 84 (A, 12) + ENG 66 (B, 9) -> mean points 10.5 -> B+.
    enter_mark(&mut stdin, &mut reader, "m1", &exam1, &student, &math, 84);
    enter_mark(&mut stdin, &mut reader, "m2", &exam1, &student, &eng, 66);
    // Term 2: MAT 70 (B+, 10) + ENG 80 (A, 12) -> mean points 11 -> A-.
    enter_mark(&mut stdin, &mut reader, "m3", &exam2_id, &student, &math, 70);
    enter_mark(&mut stdin, &mut reader, "m4", &exam2_id, &student, &eng, 80);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "recompute.term",
        json!({ "termId": term1 }),
    );

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "rep1",
        "report.term",
        json!({ "studentId": student, "termId": term1 }),
    );
    let report = &report["report"];
    assert_eq!(report["student"]["classLabel"].as_str(), Some("Form 2 North"));
    assert_eq!(report["term"]["label"].as_str(), Some("2026 Term 1"));
    assert_eq!(report["totalMarks"].as_i64(), Some(150));
    assert_eq!(report["totalPoints"].as_i64(), Some(21));
    assert_eq!(report["subjectsTaken"].as_i64(), Some(2));
    assert_eq!(report["average"].as_f64(), Some(75.0));
    assert_eq!(report["meanGrade"].as_str(), Some("B+"));
    assert_eq!(report["positionInStream"].as_i64(), Some(1));

    // Subject rows come back in subject-name order with derived remarks.
    let lines = report["subjects"].as_array().expect("subjects");
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["subject"].as_str(), Some("English"));
    assert_eq!(lines[0]["grade"].as_str(), Some("B"));
    assert_eq!(lines[0]["remarks"].as_str(), Some("Very Good"));
    assert_eq!(lines[1]["subject"].as_str(), Some("Mathematics"));
    assert_eq!(lines[1]["points"].as_i64(), Some(12));

    // Term 2 was never ranked: averages are derived on the fly and the
    // mean grade falls back to the marks axis; positions stay null.
    let unranked = request_ok(
        &mut stdin,
        &mut reader,
        "rep2",
        "report.term",
        json!({ "studentId": student, "termId": term2_id }),
    );
    let unranked = &unranked["report"];
    assert_eq!(unranked["average"].as_f64(), Some(75.0));
    assert_eq!(unranked["meanGrade"].as_str(), Some("A-"));
    assert!(unranked["positionInStream"].is_null());

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "r2",
        "recompute.term",
        json!({ "termId": term2_id }),
    );

    let annual = request_ok(
        &mut stdin,
        &mut reader,
        "annual",
        "report.annual",
        json!({ "studentId": student, "academicYear": "2026" }),
    );
    assert_eq!(annual["termReports"].as_array().map(|a| a.len()), Some(2));
    assert_eq!(annual["annualAverage"].as_f64(), Some(75.0));
    assert_eq!(annual["annualMeanGrade"].as_str(), Some("A-"));
    assert_eq!(annual["annualTotalPoints"].as_i64(), Some(43));

    // No results in a year the student never sat.
    let other_year = request_ok(
        &mut stdin,
        &mut reader,
        "t3",
        "terms.create",
        json!({ "academicYear": "2027", "term": 1 }),
    );
    assert!(other_year["termId"].as_str().is_some());
    let error = test_support::request_err(
        &mut stdin,
        &mut reader,
        "annual-empty",
        "report.annual",
        json!({ "studentId": student, "academicYear": "2027" }),
    );
    assert_eq!(error["code"].as_str(), Some("not_found"));
}
