use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::screening::domain::{
    EnrollmentStatus, ExternalStudentId, Gender, RecordId, StudentId, StudentRecord,
};
use crate::screening::merge::calculate_completion_status;
use crate::screening::record::ScreeningRecord;
use crate::screening::repository::{
    RepositoryError, SaveMode, ScreeningRepository, StudentDirectory,
};
use crate::screening::submission::{
    DemographicSnapshot, HearingReading, PhasePair, ScreeningSubmission, ScreeningType,
    VisionReading,
};
use crate::screening::{NotesPolicy, ScreeningService};

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn today() -> NaiveDate {
    date(2025, 10, 1)
}

pub(super) fn student() -> StudentRecord {
    StudentRecord {
        id: StudentId("stu-001".to_string()),
        unique_id: ExternalStudentId("ST0001".to_string()),
        first_name: "Maya".to_string(),
        last_name: "Hernandez".to_string(),
        grade: "5th".to_string(),
        gender: Gender::Female,
        school: "Lincoln Elementary".to_string(),
        teacher: Some("Ms. Rivera".to_string()),
        dob: Some(date(2015, 3, 14)),
        status: EnrollmentStatus::Returning,
    }
}

pub(super) fn classmate() -> StudentRecord {
    StudentRecord {
        id: StudentId("stu-002".to_string()),
        unique_id: ExternalStudentId("ST0002".to_string()),
        first_name: "Leo".to_string(),
        last_name: "Hernandez".to_string(),
        grade: "8th".to_string(),
        gender: Gender::Male,
        school: "Lincoln Middle".to_string(),
        teacher: None,
        dob: Some(date(2012, 6, 2)),
        status: EnrollmentStatus::New,
    }
}

pub(super) fn snapshot() -> DemographicSnapshot {
    DemographicSnapshot {
        student_first_name: Some("Maya".to_string()),
        student_last_name: Some("Hernandez".to_string()),
        student_grade: Some("5th".to_string()),
        student_gender: Some("Female".to_string()),
        student_status: Some("Returning".to_string()),
        ..DemographicSnapshot::default()
    }
}

pub(super) fn vision_submission() -> ScreeningSubmission {
    ScreeningSubmission {
        unique_id: Some("ST0001".to_string()),
        screening_date: Some(date(2025, 9, 30)),
        screening_type: Some(ScreeningType::Initial),
        notes: Some("Squints at the board".to_string()),
        student: snapshot(),
        vision: Some(PhasePair {
            initial: Some(VisionReading {
                screener: Some("Nurse Joy".to_string()),
                date: Some(date(2025, 9, 30)),
                result: Some("Pass".to_string()),
                ..VisionReading::default()
            }),
            rescreen: None,
        }),
        ..ScreeningSubmission::default()
    }
}

pub(super) fn hearing_submission() -> ScreeningSubmission {
    ScreeningSubmission {
        unique_id: Some("ST0001".to_string()),
        screening_date: Some(date(2025, 10, 14)),
        screening_type: Some(ScreeningType::Rescreen),
        notes: Some("Referred to audiologist".to_string()),
        hearing: Some(PhasePair {
            initial: None,
            rescreen: Some(HearingReading {
                screener: Some("Nurse Joy".to_string()),
                result: Some("fail".to_string()),
                ..HearingReading::default()
            }),
        }),
        ..ScreeningSubmission::default()
    }
}

pub(super) fn build_service() -> (
    ScreeningService<MemoryStudents, MemoryRecords>,
    Arc<MemoryStudents>,
    Arc<MemoryRecords>,
) {
    let students = Arc::new(MemoryStudents::with(vec![student(), classmate()]));
    let records = Arc::new(MemoryRecords::default());
    let service = ScreeningService::new(students.clone(), records.clone(), NotesPolicy::Drop);
    (service, students, records)
}

#[derive(Default, Clone)]
pub(super) struct MemoryStudents {
    students: Arc<Mutex<HashMap<StudentId, StudentRecord>>>,
}

impl MemoryStudents {
    pub(super) fn with(students: Vec<StudentRecord>) -> Self {
        let directory = Self::default();
        {
            let mut guard = directory.students.lock().expect("directory mutex poisoned");
            for student in students {
                guard.insert(student.id.clone(), student);
            }
        }
        directory
    }
}

impl StudentDirectory for MemoryStudents {
    fn find_by_external_id(
        &self,
        unique_id: &ExternalStudentId,
    ) -> Result<Option<StudentRecord>, RepositoryError> {
        let guard = self.students.lock().expect("directory mutex poisoned");
        Ok(guard
            .values()
            .find(|student| student.unique_id.matches(&unique_id.0))
            .cloned())
    }

    fn search(
        &self,
        last_name: Option<&str>,
        school: Option<&str>,
    ) -> Result<Vec<StudentRecord>, RepositoryError> {
        let contains = |value: &str, term: Option<&str>| {
            term.map_or(true, |term| {
                value.to_lowercase().contains(&term.to_lowercase())
            })
        };
        let guard = self.students.lock().expect("directory mutex poisoned");
        let mut matches: Vec<StudentRecord> = guard
            .values()
            .filter(|student| contains(&student.last_name, last_name))
            .filter(|student| contains(&student.school, school))
            .cloned()
            .collect();
        matches.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(matches)
    }

    fn update(&self, student: StudentRecord) -> Result<StudentRecord, RepositoryError> {
        let mut guard = self.students.lock().expect("directory mutex poisoned");
        match guard.get_mut(&student.id) {
            Some(stored) => {
                *stored = student.clone();
                Ok(student)
            }
            None => Err(RepositoryError::NotFound),
        }
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRecords {
    pub(super) records: Arc<Mutex<HashMap<StudentId, ScreeningRecord>>>,
}

impl MemoryRecords {
    pub(super) fn stored(&self, student_id: &StudentId) -> Option<ScreeningRecord> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .get(student_id)
            .cloned()
    }

    /// Simulates another writer landing after our read.
    pub(super) fn bump_version(&self, student_id: &StudentId) {
        if let Some(record) = self
            .records
            .lock()
            .expect("repository mutex poisoned")
            .get_mut(student_id)
        {
            record.version += 1;
        }
    }
}

impl ScreeningRepository for MemoryRecords {
    fn find_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<ScreeningRecord>, RepositoryError> {
        Ok(self.stored(student_id))
    }

    fn save(
        &self,
        mut record: ScreeningRecord,
        mode: SaveMode,
    ) -> Result<ScreeningRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let key = record.row.student_id.clone();
        match (mode, guard.get(&key)) {
            (SaveMode::Insert, Some(_)) => {
                return Err(RepositoryError::Conflict(format!("{} already has a record", key.0)))
            }
            (SaveMode::Insert, None) => {
                record.id = Some(RecordId(format!("scr-{:06}", guard.len() + 1)));
                record.version = 1;
            }
            (SaveMode::Update { expected_version }, Some(stored))
                if stored.version == expected_version =>
            {
                record.id = stored.id.clone();
                record.version = stored.version + 1;
            }
            (SaveMode::Update { .. }, Some(_)) => {
                return Err(RepositoryError::Conflict("stale version".to_string()))
            }
            (SaveMode::Update { .. }, None) => return Err(RepositoryError::NotFound),
        }
        record.completion = Some(calculate_completion_status(Some(&record)));
        guard.insert(key, record.clone());
        Ok(record)
    }
}

/// Hands out the stored record, then lets a concurrent writer bump it.
#[derive(Default, Clone)]
pub(super) struct RacingRecords {
    pub(super) inner: MemoryRecords,
}

impl ScreeningRepository for RacingRecords {
    fn find_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<ScreeningRecord>, RepositoryError> {
        let found = self.inner.find_for_student(student_id)?;
        self.inner.bump_version(student_id);
        Ok(found)
    }

    fn save(
        &self,
        record: ScreeningRecord,
        mode: SaveMode,
    ) -> Result<ScreeningRecord, RepositoryError> {
        self.inner.save(record, mode)
    }
}

pub(super) struct UnavailableRecords;

impl ScreeningRepository for UnavailableRecords {
    fn find_for_student(
        &self,
        _student_id: &StudentId,
    ) -> Result<Option<ScreeningRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn save(
        &self,
        _record: ScreeningRecord,
        _mode: SaveMode,
    ) -> Result<ScreeningRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
