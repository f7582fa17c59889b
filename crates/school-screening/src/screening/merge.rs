//! Accumulates partial, multi-visit screening results into one record per
//! student without losing anything recorded on an earlier visit.

use chrono::{Datelike, NaiveDate};

use super::domain::{
    CompletionSet, EnrollmentStatus, Gender, OverallResult, Phase, StudentProfile, StudentRecord,
    TestKind,
};
use super::record::{Field, ResultSheet, ScreeningRecord, ScreeningRow};
use super::submission::{
    DemographicSnapshot, PhasePair, PhaseReading, ScreeningSubmission, ScreeningType,
};

const UNKNOWN_GRADE: &str = "Unknown";

/// Screener determination for a test: the initial result when recorded,
/// otherwise the rescreen result.
pub fn extract_overall_result<R: PhaseReading>(
    readings: Option<&PhasePair<R>>,
) -> Option<OverallResult> {
    let readings = readings?;
    let raw = readings
        .get(Phase::Initial)
        .and_then(R::result)
        .or_else(|| readings.get(Phase::Rescreen).and_then(R::result))?;
    OverallResult::normalize(raw)
}

/// Build the row for one submission. `existing` only decides whether the
/// required flags are computed; stored values are combined later by
/// [`merge_into_existing`].
pub fn build_screening_row(
    submission: &ScreeningSubmission,
    existing: Option<&ScreeningRecord>,
    student: &StudentRecord,
    today: NaiveDate,
) -> ScreeningRow {
    let mut snapshot = submission.student.clone();
    if snapshot.student_school.is_none() && !student.school.trim().is_empty() {
        snapshot.student_school = Some(student.school.clone());
    }

    let (initial_notes, rescreen_notes) = match submission
        .screening_type
        .as_ref()
        .and_then(ScreeningType::phase)
    {
        Some(Phase::Initial) => (submission.notes.clone(), None),
        Some(Phase::Rescreen) => (None, submission.notes.clone()),
        None => (None, None),
    };

    let required = match existing {
        Some(record) if record.is_persisted() => None,
        _ => Some(snapshot_profile(&submission.student).requirements()),
    };

    ScreeningRow {
        student_id: student.id.clone(),
        unique_id: student.unique_id.clone(),
        student: snapshot,
        screening_year: today.year(),
        initial_screening_date: submission.screening_date.unwrap_or(today),
        was_absent: submission.was_absent.unwrap_or(false),
        initial_notes,
        rescreen_notes,
        required,
        results: result_sheet(submission),
        vision_overall: extract_overall_result(submission.vision.as_ref()),
        hearing_overall: extract_overall_result(submission.hearing.as_ref()),
    }
}

/// Overlay every supplied value of `row` onto a copy of `existing`.
/// Generated completion columns are stripped from the copy.
pub fn merge_into_existing(existing: &ScreeningRecord, row: ScreeningRow) -> ScreeningRecord {
    let mut merged = existing.clone();
    merged.completion = None;

    let target = &mut merged.row;
    target.student_id = row.student_id;
    target.unique_id = row.unique_id;
    overlay_snapshot(&mut target.student, row.student);
    target.screening_year = row.screening_year;
    target.initial_screening_date = row.initial_screening_date;
    target.was_absent = row.was_absent;
    overlay(&mut target.initial_notes, row.initial_notes);
    overlay(&mut target.rescreen_notes, row.rescreen_notes);
    overlay(&mut target.required, row.required);
    target.results.overlay(row.results);
    overlay(&mut target.vision_overall, row.vision_overall);
    overlay(&mut target.hearing_overall, row.hearing_overall);

    merged
}

/// A test is complete once it passed initially or has a rescreen result of
/// any kind.
pub fn calculate_completion_status(record: Option<&ScreeningRecord>) -> CompletionSet {
    let mut completion = CompletionSet::default();
    let Some(record) = record else {
        return completion;
    };

    let results = &record.row.results;
    for test in TestKind::ordered() {
        let passed_initial = results
            .result(test, Phase::Initial)
            .and_then(OverallResult::normalize)
            == Some(OverallResult::Pass);
        let rescreened = results.get(test, Phase::Rescreen, Field::Result).is_some();
        completion.set(test, passed_initial || rescreened);
    }

    completion
}

fn snapshot_profile(snapshot: &DemographicSnapshot) -> StudentProfile {
    StudentProfile {
        grade: snapshot
            .student_grade
            .clone()
            .unwrap_or_else(|| UNKNOWN_GRADE.to_string()),
        gender: snapshot
            .student_gender
            .as_deref()
            .map(Gender::parse)
            .unwrap_or(Gender::Unknown),
        status: snapshot
            .student_status
            .as_deref()
            .map(EnrollmentStatus::parse)
            .unwrap_or(EnrollmentStatus::New),
        date_of_birth: snapshot.student_dob,
    }
}

fn result_sheet(submission: &ScreeningSubmission) -> ResultSheet {
    let mut sheet = ResultSheet::default();
    add_readings(&mut sheet, TestKind::Vision, submission.vision.as_ref());
    add_readings(&mut sheet, TestKind::Hearing, submission.hearing.as_ref());
    add_readings(&mut sheet, TestKind::Acanthosis, submission.acanthosis.as_ref());
    add_readings(&mut sheet, TestKind::Scoliosis, submission.scoliosis.as_ref());
    sheet
}

fn add_readings<R: PhaseReading>(
    sheet: &mut ResultSheet,
    test: TestKind,
    readings: Option<&PhasePair<R>>,
) {
    let Some(readings) = readings else {
        return;
    };
    for (phase, reading) in readings.readings() {
        sheet.insert_phase(test, phase, reading.fields());
    }
}

fn overlay_snapshot(stored: &mut DemographicSnapshot, incoming: DemographicSnapshot) {
    overlay(&mut stored.student_first_name, incoming.student_first_name);
    overlay(&mut stored.student_last_name, incoming.student_last_name);
    overlay(&mut stored.student_grade, incoming.student_grade);
    overlay(&mut stored.student_gender, incoming.student_gender);
    overlay(&mut stored.student_school, incoming.student_school);
    overlay(&mut stored.student_teacher, incoming.student_teacher);
    overlay(&mut stored.student_dob, incoming.student_dob);
    overlay(&mut stored.student_status, incoming.student_status);
}

fn overlay<T>(slot: &mut Option<T>, incoming: Option<T>) {
    if let Some(value) = incoming {
        *slot = Some(value);
    }
}
