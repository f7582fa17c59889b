use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Internal registry key for a student (the storage row id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudentId(pub String);

/// Human-facing student identifier printed on screening forms (e.g. `st0001`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalStudentId(pub String);

impl ExternalStudentId {
    pub fn matches(&self, other: &str) -> bool {
        self.0.trim().eq_ignore_ascii_case(other.trim())
    }
}

impl fmt::Display for ExternalStudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage identity of a screening record, assigned on first save.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Gender {
    Male,
    Female,
    Other,
    Unknown,
}

impl Gender {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "male" => Self::Male,
            "female" => Self::Female,
            "other" => Self::Other,
            _ => Self::Unknown,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
            Self::Unknown => "Unknown",
        }
    }
}

impl From<String> for Gender {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Gender> for &'static str {
    fn from(value: Gender) -> Self {
        value.label()
    }
}

/// Enrollment status. Anything other than "new" counts as returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum EnrollmentStatus {
    New,
    Returning,
}

impl EnrollmentStatus {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("new") {
            Self::New
        } else {
            Self::Returning
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Returning => "Returning",
        }
    }

    pub const fn is_new(self) -> bool {
        matches!(self, Self::New)
    }
}

impl From<String> for EnrollmentStatus {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<EnrollmentStatus> for &'static str {
    fn from(value: EnrollmentStatus) -> Self {
        value.label()
    }
}

/// Demographic snapshot the eligibility rules evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub grade: String,
    pub gender: Gender,
    pub status: EnrollmentStatus,
    pub date_of_birth: Option<NaiveDate>,
}

/// Student registry row as supplied by the student directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: StudentId,
    pub unique_id: ExternalStudentId,
    pub first_name: String,
    pub last_name: String,
    pub grade: String,
    pub gender: Gender,
    pub school: String,
    pub teacher: Option<String>,
    pub dob: Option<NaiveDate>,
    pub status: EnrollmentStatus,
}

impl StudentRecord {
    pub fn profile(&self) -> StudentProfile {
        StudentProfile {
            grade: self.grade.clone(),
            gender: self.gender,
            status: self.status,
            date_of_birth: self.dob,
        }
    }
}

/// The four mandated screening programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    Vision,
    Hearing,
    Acanthosis,
    Scoliosis,
}

impl TestKind {
    pub const fn ordered() -> [Self; 4] {
        [Self::Vision, Self::Hearing, Self::Acanthosis, Self::Scoliosis]
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::Vision => "vision",
            Self::Hearing => "hearing",
            Self::Acanthosis => "acanthosis",
            Self::Scoliosis => "scoliosis",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Vision => "Vision",
            Self::Hearing => "Hearing",
            Self::Acanthosis => "Acanthosis Nigricans",
            Self::Scoliosis => "Scoliosis",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ordered().into_iter().find(|test| test.key() == key)
    }
}

/// Visit within a screening cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initial,
    Rescreen,
}

impl Phase {
    pub const fn ordered() -> [Self; 2] {
        [Self::Initial, Self::Rescreen]
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Rescreen => "rescreen",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ordered().into_iter().find(|phase| phase.key() == key)
    }
}

/// Screener's explicit determination for a test, stored as `PASS`/`FAIL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OverallResult {
    Pass,
    Fail,
}

impl OverallResult {
    /// Trims and lowercases before matching; anything but pass/fail is no determination.
    pub fn normalize(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pass" => Some(Self::Pass),
            "fail" => Some(Self::Fail),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

/// One boolean per test type. Used for both requirement and completion sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFlags {
    pub vision: bool,
    pub hearing: bool,
    pub acanthosis: bool,
    pub scoliosis: bool,
}

impl TestFlags {
    pub const fn get(&self, test: TestKind) -> bool {
        match test {
            TestKind::Vision => self.vision,
            TestKind::Hearing => self.hearing,
            TestKind::Acanthosis => self.acanthosis,
            TestKind::Scoliosis => self.scoliosis,
        }
    }

    pub fn set(&mut self, test: TestKind, value: bool) {
        match test {
            TestKind::Vision => self.vision = value,
            TestKind::Hearing => self.hearing = value,
            TestKind::Acanthosis => self.acanthosis = value,
            TestKind::Scoliosis => self.scoliosis = value,
        }
    }

    pub fn enabled(&self) -> impl Iterator<Item = TestKind> + '_ {
        TestKind::ordered()
            .into_iter()
            .filter(move |test| self.get(*test))
    }
}

/// Screenings mandated for a student's demographic profile.
pub type RequirementSet = TestFlags;

/// Screenings for which no further action is expected this cycle.
pub type CompletionSet = TestFlags;
