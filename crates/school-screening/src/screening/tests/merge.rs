use super::common::*;
use crate::screening::domain::{OverallResult, Phase, RecordId, TestKind};
use crate::screening::merge::{
    build_screening_row, calculate_completion_status, extract_overall_result, merge_into_existing,
};
use crate::screening::record::{Field, FieldValue, ScreeningRecord};
use crate::screening::submission::{
    AcanthosisReading, PhasePair, ScreeningSubmission, ScreeningType, VisionReading,
};

fn persisted(record: ScreeningRecord) -> ScreeningRecord {
    ScreeningRecord {
        id: Some(RecordId("scr-000001".to_string())),
        version: 1,
        ..record
    }
}

fn vision_results(initial: Option<&str>, rescreen: Option<&str>) -> PhasePair<VisionReading> {
    let reading = |result: Option<&str>| {
        result.map(|raw| VisionReading {
            result: Some(raw.to_string()),
            ..VisionReading::default()
        })
    };
    PhasePair {
        initial: reading(initial),
        rescreen: reading(rescreen),
    }
}

#[test]
fn overall_result_prefers_initial_and_normalizes() {
    let passed = vision_results(Some(" Pass "), Some("fail"));
    assert_eq!(extract_overall_result(Some(&passed)), Some(OverallResult::Pass));

    let rescreen_only = vision_results(None, Some("fail"));
    assert_eq!(
        extract_overall_result(Some(&rescreen_only)),
        Some(OverallResult::Fail)
    );

    let undecided = vision_results(Some("maybe"), Some("pass"));
    assert_eq!(extract_overall_result(Some(&undecided)), None);
    assert_eq!(extract_overall_result::<VisionReading>(None), None);
}

#[test]
fn new_row_freezes_requirements_from_submitted_snapshot() {
    let row = build_screening_row(&vision_submission(), None, &student(), today());

    let required = row.required.expect("first row carries requirements");
    assert!(required.vision && required.hearing && required.acanthosis && required.scoliosis);
    assert_eq!(row.screening_year, 2025);
    assert_eq!(row.initial_screening_date, date(2025, 9, 30));
    assert!(!row.was_absent);
    assert_eq!(row.initial_notes.as_deref(), Some("Squints at the board"));
    assert!(row.rescreen_notes.is_none());
    assert_eq!(row.vision_overall, Some(OverallResult::Pass));
    assert!(row.hearing_overall.is_none());
    assert_eq!(
        row.student.student_school.as_deref(),
        Some("Lincoln Elementary"),
        "school falls back to the registry"
    );
}

#[test]
fn missing_snapshot_uses_unknown_grade_defaults() {
    let submission = ScreeningSubmission {
        student: Default::default(),
        ..vision_submission()
    };
    let row = build_screening_row(&submission, None, &student(), today());
    let required = row.required.expect("requirements computed");
    assert!(!required.vision && !required.hearing && !required.acanthosis && !required.scoliosis);
}

#[test]
fn persisted_record_skips_requirement_calculation() {
    let first = build_screening_row(&vision_submission(), None, &student(), today());
    let stored = persisted(ScreeningRecord::draft(first));

    let draft_only = ScreeningRecord::draft(stored.row.clone());
    let second = build_screening_row(&hearing_submission(), Some(&stored), &student(), today());
    assert!(second.required.is_none());

    let recomputed = build_screening_row(&hearing_submission(), Some(&draft_only), &student(), today());
    assert!(recomputed.required.is_some(), "unsaved record has no id");
}

#[test]
fn notes_follow_screening_type() {
    let rescreen = build_screening_row(&hearing_submission(), None, &student(), today());
    assert_eq!(rescreen.rescreen_notes.as_deref(), Some("Referred to audiologist"));
    assert!(rescreen.initial_notes.is_none());

    let untyped = ScreeningSubmission {
        screening_type: Some(ScreeningType::Unrecognized("day1".to_string())),
        ..hearing_submission()
    };
    let row = build_screening_row(&untyped, None, &student(), today());
    assert!(row.initial_notes.is_none() && row.rescreen_notes.is_none());
}

#[test]
fn missing_screening_date_defaults_to_today() {
    let submission = ScreeningSubmission {
        screening_date: None,
        was_absent: Some(true),
        ..hearing_submission()
    };
    let row = build_screening_row(&submission, None, &student(), today());
    assert_eq!(row.initial_screening_date, today());
    assert!(row.was_absent);
}

#[test]
fn separate_visits_keep_each_others_fields() {
    let first = build_screening_row(&vision_submission(), None, &student(), today());
    let stored = persisted(ScreeningRecord::draft(first));

    let second = build_screening_row(&hearing_submission(), Some(&stored), &student(), today());
    let merged = merge_into_existing(&stored, second);

    let results = &merged.row.results;
    assert_eq!(results.result(TestKind::Vision, Phase::Initial), Some("Pass"));
    assert_eq!(results.result(TestKind::Hearing, Phase::Rescreen), Some("fail"));
    assert_eq!(
        results.get(TestKind::Vision, Phase::Initial, Field::Screener),
        Some(&FieldValue::Text("Nurse Joy".to_string()))
    );
    assert_eq!(merged.row.vision_overall, Some(OverallResult::Pass));
    assert_eq!(merged.row.hearing_overall, Some(OverallResult::Fail));
    assert_eq!(merged.row.initial_notes.as_deref(), Some("Squints at the board"));
    assert_eq!(merged.row.rescreen_notes.as_deref(), Some("Referred to audiologist"));
    assert_eq!(merged.row.student.student_grade.as_deref(), Some("5th"));
    assert_eq!(merged.row.required, stored.row.required);
    assert_eq!(merged.row.initial_screening_date, date(2025, 10, 14));
    assert_eq!(merged.id, stored.id);
    assert_eq!(merged.version, stored.version);
}

#[test]
fn merging_the_same_submission_twice_is_idempotent() {
    let first = build_screening_row(&vision_submission(), None, &student(), today());
    let stored = persisted(ScreeningRecord::draft(first));

    let once = merge_into_existing(
        &stored,
        build_screening_row(&vision_submission(), Some(&stored), &student(), today()),
    );
    let twice = merge_into_existing(
        &once,
        build_screening_row(&vision_submission(), Some(&once), &student(), today()),
    );

    assert_eq!(once, twice);
    assert_eq!(twice.row.required, stored.row.required);
}

#[test]
fn merge_strips_generated_completion() {
    let first = build_screening_row(&vision_submission(), None, &student(), today());
    let mut stored = persisted(ScreeningRecord::draft(first));
    stored.completion = Some(calculate_completion_status(Some(&stored)));

    let merged = merge_into_existing(
        &stored,
        build_screening_row(&hearing_submission(), Some(&stored), &student(), today()),
    );
    assert!(merged.completion.is_none());
    assert!(!merged.to_columns().contains_key("vision_complete"));
}

#[test]
fn completion_requires_initial_pass_or_any_rescreen() {
    assert_eq!(calculate_completion_status(None), Default::default());

    let submission = ScreeningSubmission {
        vision: Some(vision_results(Some(" PASS "), None)),
        hearing: None,
        acanthosis: Some(PhasePair {
            initial: Some(AcanthosisReading {
                result: Some("fail".to_string()),
                ..AcanthosisReading::default()
            }),
            rescreen: None,
        }),
        ..hearing_submission()
    };
    let record = ScreeningRecord::draft(build_screening_row(&submission, None, &student(), today()));
    let completion = calculate_completion_status(Some(&record));
    assert!(completion.vision, "initial pass completes");
    assert!(!completion.acanthosis, "initial fail awaits rescreen");
    assert!(!completion.scoliosis);

    let rescreened = ScreeningRecord::draft(build_screening_row(
        &hearing_submission(),
        None,
        &student(),
        today(),
    ));
    assert!(calculate_completion_status(Some(&rescreened)).hearing);
}

#[test]
fn non_text_rescreen_results_still_complete_the_test() {
    let record = ScreeningRecord::draft(build_screening_row(
        &vision_submission(),
        None,
        &student(),
        today(),
    ));
    let mut columns = record.to_columns();
    columns.insert("acanthosis_rescreen_result".to_string(), serde_json::json!(1));

    let decoded = ScreeningRecord::from_columns(&columns).expect("columns decode");
    let completion = calculate_completion_status(Some(&decoded));
    assert!(completion.acanthosis, "numeric rescreen result counts");
    assert!(!completion.hearing);

    let mut flagged = decoded;
    flagged.row.results.set(
        TestKind::Scoliosis,
        Phase::Rescreen,
        Field::Result,
        FieldValue::Flag(true),
    );
    assert!(calculate_completion_status(Some(&flagged)).scoliosis);
}
