use chrono::{Datelike, NaiveDate};

use super::super::domain::{EnrollmentStatus, Gender};
use super::grade::GradeLevel;

/// Older four-year-olds (born on or before September 1 of their birth year)
/// are screened for vision and hearing; younger ones and unknown DOBs are not.
pub(crate) fn pre_k_four_screened(date_of_birth: Option<NaiveDate>) -> bool {
    date_of_birth
        .and_then(|dob| {
            NaiveDate::from_ymd_opt(dob.year(), 9, 1).map(|september_first| dob <= september_first)
        })
        .unwrap_or(false)
}

pub(crate) fn acanthosis_required(grade: GradeLevel, status: EnrollmentStatus) -> bool {
    match grade.ordinal() {
        Some(1 | 3 | 5 | 7) => true,
        Some(2 | 4 | 6 | 8..=12) => status.is_new(),
        _ => false,
    }
}

pub(crate) fn scoliosis_required(
    grade: GradeLevel,
    gender: Gender,
    status: EnrollmentStatus,
) -> bool {
    match grade.ordinal() {
        Some(5 | 7) => gender == Gender::Female,
        Some(8) => status.is_new() || gender == Gender::Male,
        _ => false,
    }
}
