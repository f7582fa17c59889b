use tracing::warn;

use super::domain::OverallResult;
use super::submission::{ScreeningSubmission, ScreeningType};

/// Validation errors raised before a submission touches storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required fields: uniqueId")]
    MissingStudentId,
    #[error("Missing required fields: screeningDate")]
    MissingScreeningDate,
    #[error("notes were supplied without a screeningType of initial or rescreen")]
    UntypedNotes,
    #[error("Provide lastName and/or school to search")]
    MissingSearchTerms,
    #[error("{0} cannot be blank")]
    BlankStudentField(&'static str),
}

/// What to do with notes whose screening type is missing or unrecognized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotesPolicy {
    /// Discard the notes and log a warning.
    #[default]
    Drop,
    /// Refuse the submission.
    Reject,
    /// File them as initial-visit notes.
    Initial,
}

impl NotesPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "drop" => Some(Self::Drop),
            "reject" => Some(Self::Reject),
            "initial" => Some(Self::Initial),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Reject => "reject",
            Self::Initial => "initial",
        }
    }
}

/// Guard producing normalized submissions for the merge engine.
#[derive(Debug, Clone, Default)]
pub struct SubmissionGuard {
    notes_policy: NotesPolicy,
}

impl SubmissionGuard {
    pub fn new(notes_policy: NotesPolicy) -> Self {
        Self { notes_policy }
    }

    pub fn notes_policy(&self) -> NotesPolicy {
        self.notes_policy
    }

    /// Trim free text, enforce the required fields, and settle untyped notes.
    pub fn validate(
        &self,
        submission: ScreeningSubmission,
    ) -> Result<ScreeningSubmission, ValidationError> {
        let mut submission = submission.normalized();

        if submission.unique_id.is_none() {
            return Err(ValidationError::MissingStudentId);
        }
        if submission.screening_date.is_none() {
            return Err(ValidationError::MissingScreeningDate);
        }

        let typed = submission
            .screening_type
            .as_ref()
            .and_then(ScreeningType::phase)
            .is_some();
        if submission.notes.is_some() && !typed {
            match self.notes_policy {
                NotesPolicy::Drop => {
                    warn!(
                        unique_id = submission.unique_id.as_deref().unwrap_or_default(),
                        screening_type = ?submission.screening_type,
                        "dropping notes without a recognized screening type"
                    );
                    submission.notes = None;
                }
                NotesPolicy::Reject => return Err(ValidationError::UntypedNotes),
                NotesPolicy::Initial => {
                    submission.screening_type = Some(ScreeningType::Initial);
                }
            }
        }

        for (test, phase, raw) in submission.results() {
            if OverallResult::normalize(raw).is_none() {
                warn!(
                    unique_id = submission.unique_id.as_deref().unwrap_or_default(),
                    test = test.key(),
                    phase = phase.key(),
                    result = raw,
                    "screening result is neither pass nor fail"
                );
            }
        }

        Ok(submission)
    }
}
