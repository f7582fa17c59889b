//! School health screening: eligibility rules, submission intake, and the
//! selective merge that folds each visit into a student's single record.
//!
//! A submission is validated by [`SubmissionGuard`], turned into a
//! [`ScreeningRow`], overlaid onto the stored [`ScreeningRecord`] (if any),
//! and saved with an optimistic version check. Required screenings are frozen
//! when the record is first created; completion is always derived on read.

pub mod domain;
pub mod eligibility;
pub(crate) mod intake;
pub mod merge;
pub mod record;
pub mod repository;
pub mod router;
pub mod service;
pub mod student_update;
pub mod submission;

#[cfg(test)]
mod tests;

pub use domain::{
    CompletionSet, EnrollmentStatus, ExternalStudentId, Gender, OverallResult, Phase, RecordId,
    RequirementSet, StudentId, StudentProfile, StudentRecord, TestFlags, TestKind,
};
pub use eligibility::{calculate_requirements, GradeLevel};
pub use intake::{NotesPolicy, SubmissionGuard, ValidationError};
pub use merge::{
    build_screening_row, calculate_completion_status, extract_overall_result, merge_into_existing,
};
pub use record::{
    parse_date, Field, FieldSet, FieldValue, RecordDecodeError, ResultSheet, ScreeningRecord,
    ScreeningRow,
};
pub use repository::{RepositoryError, SaveMode, ScreeningRepository, StudentDirectory};
pub use router::screening_router;
pub use service::{
    ScreeningService, ScreeningServiceError, StudentOverview, StudentSearch, SubmissionOutcome,
    SubmissionStatus,
};
pub use student_update::StudentUpdate;
pub use submission::{
    AcanthosisReading, DemographicSnapshot, HearingReading, PhasePair, PhaseReading,
    ScoliosisReading, ScreeningSubmission, ScreeningType, VisionReading,
};
