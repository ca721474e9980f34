mod test_support;

use serde_json::json;
use test_support::{
    create_student, enter_mark, request_ok, seed_basic_academics, spawn_sidecar, temp_dir,
};

/// End-to-end scenario: averages (92, 88, 88, 60) must rank (1, 2, 2, 4),
/// and a student with no results stays out of summaries and rankings.
#[test]
fn recompute_assigns_competition_positions() {
    let workspace = temp_dir("shuled-recompute-positions");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (term_id, exam_id, subjects) = seed_basic_academics(&mut stdin, &mut reader, &workspace);
    let (math, eng) = (subjects[0].clone(), subjects[1].clone());

    let marks_per_student = [
        ("ADM001", [94, 90]), // avg 92, mean grade A
        ("ADM002", [79, 97]), // avg 88, points 23 -> mean 11.5 -> A-
        ("ADM003", [76, 100]), // avg 88, A-
        ("ADM004", [60, 60]), // avg 60, B-
    ];
    let mut student_ids = Vec::new();
    for (i, (adm, marks)) in marks_per_student.iter().enumerate() {
        let student = create_student(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            adm,
            ("Student", adm),
            if i % 2 == 0 { "F" } else { "M" },
            1,
            "East",
        );
        enter_mark(
            &mut stdin,
            &mut reader,
            &format!("m{}a", i),
            &exam_id,
            &student,
            &math,
            marks[0],
        );
        enter_mark(
            &mut stdin,
            &mut reader,
            &format!("m{}b", i),
            &exam_id,
            &student,
            &eng,
            marks[1],
        );
        student_ids.push(student);
    }
    // Fifth student never sat any paper.
    let unexamined = create_student(
        &mut stdin,
        &mut reader,
        "s4",
        "ADM005",
        ("Student", "ADM005"),
        "M",
        1,
        "East",
    );

    let recomputed = request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "recompute.term",
        json!({ "termId": term_id }),
    );
    assert_eq!(recomputed["studentsSummarized"].as_i64(), Some(4));
    assert_eq!(recomputed["noEligibleStudents"].as_bool(), Some(false));
    assert_eq!(
        recomputed["scopesComputed"],
        json!(["stream", "class", "overall"])
    );
    assert_eq!(recomputed["cohorts"][0]["studentsSummarized"].as_i64(), Some(4));

    let expected = [
        (0, 92.0, "A", 1),
        (1, 88.0, "A-", 2),
        (2, 88.0, "A-", 2),
        (3, 60.0, "B-", 4),
    ];
    for (idx, average, mean_grade, position) in expected {
        let report = request_ok(
            &mut stdin,
            &mut reader,
            &format!("rep{}", idx),
            "report.term",
            json!({ "studentId": student_ids[idx], "termId": term_id }),
        );
        let report = &report["report"];
        assert_eq!(report["average"].as_f64(), Some(average));
        assert_eq!(report["meanGrade"].as_str(), Some(mean_grade));
        assert_eq!(report["positionInStream"].as_i64(), Some(position));
        // One class, one stream: every scope agrees here.
        assert_eq!(report["positionInClass"].as_i64(), Some(position));
        assert_eq!(report["positionOverall"].as_i64(), Some(position));
    }

    // Recomputing again yields the same positions (idempotence).
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "r2",
        "recompute.term",
        json!({ "termId": term_id }),
    );
    assert_eq!(again["studentsSummarized"].as_i64(), Some(4));
    let report = request_ok(
        &mut stdin,
        &mut reader,
        "rep-again",
        "report.term",
        json!({ "studentId": student_ids[1], "termId": term_id }),
    );
    assert_eq!(report["report"]["positionInStream"].as_i64(), Some(2));

    // The unexamined student has no summary and no report.
    let error = test_support::request_err(
        &mut stdin,
        &mut reader,
        "rep-missing",
        "report.term",
        json!({ "studentId": unexamined, "termId": term_id }),
    );
    assert_eq!(error["code"].as_str(), Some("not_found"));

    // And the class analytics only count the four examined students.
    let perf = request_ok(
        &mut stdin,
        &mut reader,
        "perf",
        "analytics.class.performance",
        json!({ "termId": term_id, "classLevel": 1 }),
    );
    let performance = &perf["performance"];
    assert_eq!(performance["totalStudents"].as_i64(), Some(4));
    assert_eq!(performance["excellent"].as_i64(), Some(3));
    assert_eq!(performance["fair"].as_i64(), Some(1));
    assert_eq!(performance["poor"].as_i64(), Some(0));
    assert_eq!(
        performance["gradeDistribution"],
        json!([
            { "grade": "A", "count": 1 },
            { "grade": "A-", "count": 2 },
            { "grade": "B-", "count": 1 },
        ])
    );
}

#[test]
fn recompute_with_no_eligible_students_is_not_an_error() {
    let workspace = temp_dir("shuled-recompute-empty");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (term_id, _exam_id, _subjects) = seed_basic_academics(&mut stdin, &mut reader, &workspace);

    let recomputed = request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "recompute.term",
        json!({ "termId": term_id, "classLevel": 4 }),
    );
    assert_eq!(recomputed["noEligibleStudents"].as_bool(), Some(true));
    assert_eq!(recomputed["studentsSummarized"].as_i64(), Some(0));

    // An unknown term, by contrast, is a computation failure.
    let error = test_support::request_err(
        &mut stdin,
        &mut reader,
        "r2",
        "recompute.term",
        json!({ "termId": "no-such-term" }),
    );
    assert_eq!(error["code"].as_str(), Some("not_found"));
}
