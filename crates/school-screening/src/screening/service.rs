use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{debug, info};

use super::domain::{CompletionSet, ExternalStudentId, RequirementSet, StudentRecord};
use super::intake::{NotesPolicy, SubmissionGuard, ValidationError};
use super::merge::{build_screening_row, calculate_completion_status, merge_into_existing};
use super::record::ScreeningRecord;
use super::repository::{RepositoryError, SaveMode, ScreeningRepository, StudentDirectory};
use super::student_update::StudentUpdate;
use super::submission::ScreeningSubmission;

/// Service composing intake validation, the student directory, and screening storage.
pub struct ScreeningService<D, R> {
    guard: Arc<SubmissionGuard>,
    students: Arc<D>,
    records: Arc<R>,
}

impl<D, R> ScreeningService<D, R>
where
    D: StudentDirectory + 'static,
    R: ScreeningRepository + 'static,
{
    pub fn new(students: Arc<D>, records: Arc<R>, notes_policy: NotesPolicy) -> Self {
        Self {
            guard: Arc::new(SubmissionGuard::new(notes_policy)),
            students,
            records,
        }
    }

    /// Merge a submission into the student's screening record, creating it
    /// on the first visit.
    pub fn submit(
        &self,
        submission: ScreeningSubmission,
    ) -> Result<SubmissionOutcome, ScreeningServiceError> {
        self.submit_on(submission, Local::now().date_naive())
    }

    /// [`submit`](Self::submit) with an explicit calendar date for "today".
    pub fn submit_on(
        &self,
        submission: ScreeningSubmission,
        today: NaiveDate,
    ) -> Result<SubmissionOutcome, ScreeningServiceError> {
        let submission = self.guard.validate(submission)?;
        let unique_id = ExternalStudentId(submission.unique_id.clone().unwrap_or_default());

        let student = self
            .students
            .find_by_external_id(&unique_id)?
            .ok_or_else(|| ScreeningServiceError::StudentNotFound(unique_id.clone()))?;

        let existing = self.records.find_for_student(&student.id)?;
        let row = build_screening_row(&submission, existing.as_ref(), &student, today);

        let (status, record, mode) = match existing {
            Some(stored) if stored.is_persisted() => {
                let mode = SaveMode::Update {
                    expected_version: stored.version,
                };
                (SubmissionStatus::Updated, merge_into_existing(&stored, row), mode)
            }
            _ => (
                SubmissionStatus::Created,
                ScreeningRecord::draft(row),
                SaveMode::Insert,
            ),
        };

        debug!(unique_id = %unique_id, ?mode, "saving screening record");
        let record = self.records.save(record, mode)?;

        info!(
            unique_id = %unique_id,
            status = status.label(),
            version = record.version,
            "screening submission stored"
        );

        Ok(SubmissionOutcome { status, record })
    }

    /// Student plus the screenings they owe and have completed this cycle.
    pub fn student_overview(
        &self,
        unique_id: &ExternalStudentId,
    ) -> Result<StudentOverview, ScreeningServiceError> {
        let student = self
            .students
            .find_by_external_id(unique_id)?
            .ok_or_else(|| ScreeningServiceError::StudentNotFound(unique_id.clone()))?;
        self.overview_for(student)
    }

    /// Look students up by last name and/or school. At least one term is required.
    pub fn search_students(
        &self,
        last_name: Option<&str>,
        school: Option<&str>,
    ) -> Result<StudentSearch, ScreeningServiceError> {
        let last_name = last_name.map(str::trim).filter(|term| !term.is_empty());
        let school = school.map(str::trim).filter(|term| !term.is_empty());
        if last_name.is_none() && school.is_none() {
            return Err(ValidationError::MissingSearchTerms.into());
        }

        let mut matches = self.students.search(last_name, school)?;
        match matches.len() {
            0 => Ok(StudentSearch::NoMatch),
            1 => {
                let student = matches.remove(0);
                Ok(StudentSearch::Single(self.overview_for(student)?))
            }
            _ => Ok(StudentSearch::Multiple(matches)),
        }
    }

    /// Edit a student's profile. Requirements in the returned overview follow
    /// the edited profile; the screening record's frozen flags do not change.
    pub fn update_student(
        &self,
        unique_id: &ExternalStudentId,
        update: StudentUpdate,
    ) -> Result<StudentOverview, ScreeningServiceError> {
        let student = self
            .students
            .find_by_external_id(unique_id)?
            .ok_or_else(|| ScreeningServiceError::StudentNotFound(unique_id.clone()))?;

        let student = self.students.update(update.apply(student)?)?;
        info!(
            unique_id = %student.unique_id,
            grade = %student.grade,
            "student profile updated"
        );
        self.overview_for(student)
    }

    pub fn schools(&self) -> Result<Vec<String>, ScreeningServiceError> {
        Ok(self.students.schools()?)
    }

    fn overview_for(
        &self,
        student: StudentRecord,
    ) -> Result<StudentOverview, ScreeningServiceError> {
        let record = self.records.find_for_student(&student.id)?;
        Ok(StudentOverview {
            required_screenings: student.profile().requirements(),
            completed_screenings: calculate_completion_status(record.as_ref()),
            student,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    Created,
    Updated,
}

impl SubmissionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            Self::Created => "Screening results saved",
            Self::Updated => "Screening results updated",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub status: SubmissionStatus,
    pub record: ScreeningRecord,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentOverview {
    pub student: StudentRecord,
    pub required_screenings: RequirementSet,
    pub completed_screenings: CompletionSet,
}

#[derive(Debug, Clone)]
pub enum StudentSearch {
    NoMatch,
    Single(StudentOverview),
    Multiple(Vec<StudentRecord>),
}

/// Error raised by the screening service.
#[derive(Debug, thiserror::Error)]
pub enum ScreeningServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Student not found: {0}")]
    StudentNotFound(ExternalStudentId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
