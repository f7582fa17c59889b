use std::collections::BTreeSet;

use super::domain::{ExternalStudentId, StudentId, StudentRecord};
use super::record::{RecordDecodeError, ScreeningRecord};

/// The student registry.
pub trait StudentDirectory: Send + Sync {
    fn find_by_external_id(
        &self,
        unique_id: &ExternalStudentId,
    ) -> Result<Option<StudentRecord>, RepositoryError>;

    /// Case-insensitive substring match; `None` terms match everything.
    fn search(
        &self,
        last_name: Option<&str>,
        school: Option<&str>,
    ) -> Result<Vec<StudentRecord>, RepositoryError>;

    /// Replace the stored student with the same internal id.
    fn update(&self, student: StudentRecord) -> Result<StudentRecord, RepositoryError>;

    /// Distinct non-blank school names, sorted.
    fn schools(&self) -> Result<Vec<String>, RepositoryError> {
        let schools: BTreeSet<String> = self
            .search(None, None)?
            .into_iter()
            .map(|student| student.school.trim().to_string())
            .filter(|school| !school.is_empty())
            .collect();
        Ok(schools.into_iter().collect())
    }
}

/// Storage abstraction for screening records, at most one per student.
pub trait ScreeningRepository: Send + Sync {
    fn find_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<ScreeningRecord>, RepositoryError>;

    /// Persist `record`, returning the stored copy with id, version and
    /// generated columns filled in.
    fn save(&self, record: ScreeningRecord, mode: SaveMode)
        -> Result<ScreeningRecord, RepositoryError>;
}

/// How a save is checked against what is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Fails with `Conflict` if the student already has a record.
    Insert,
    /// Fails with `Conflict` unless the stored version equals `expected_version`.
    Update { expected_version: u64 },
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("screening record was modified concurrently: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Decode(#[from] RecordDecodeError),
}
