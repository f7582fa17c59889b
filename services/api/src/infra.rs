use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use school_screening::screening::{
    calculate_completion_status, ExternalStudentId, RecordId, RepositoryError, SaveMode,
    ScreeningRecord, ScreeningRepository, StudentDirectory, StudentId, StudentRecord, TestKind,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn poisoned(store: &str) -> RepositoryError {
    RepositoryError::Unavailable(format!("{store} lock poisoned"))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryStudentDirectory {
    students: Arc<Mutex<Vec<StudentRecord>>>,
}

impl InMemoryStudentDirectory {
    pub(crate) fn from_students(students: Vec<StudentRecord>) -> Self {
        Self {
            students: Arc::new(Mutex::new(students)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<StudentRecord>>, RepositoryError> {
        self.students.lock().map_err(|_| poisoned("student directory"))
    }
}

impl StudentDirectory for InMemoryStudentDirectory {
    fn find_by_external_id(
        &self,
        unique_id: &ExternalStudentId,
    ) -> Result<Option<StudentRecord>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard
            .iter()
            .find(|student| student.unique_id.matches(&unique_id.0))
            .cloned())
    }

    fn search(
        &self,
        last_name: Option<&str>,
        school: Option<&str>,
    ) -> Result<Vec<StudentRecord>, RepositoryError> {
        let last_name = last_name.map(str::to_lowercase);
        let school = school.map(str::to_lowercase);
        let guard = self.lock()?;
        Ok(guard
            .iter()
            .filter(|student| {
                last_name
                    .as_deref()
                    .map_or(true, |term| student.last_name.to_lowercase().contains(term))
            })
            .filter(|student| {
                school
                    .as_deref()
                    .map_or(true, |term| student.school.to_lowercase().contains(term))
            })
            .cloned()
            .collect())
    }

    fn update(&self, student: StudentRecord) -> Result<StudentRecord, RepositoryError> {
        let mut guard = self.lock()?;
        let stored = guard
            .iter_mut()
            .find(|stored| stored.id == student.id)
            .ok_or(RepositoryError::NotFound)?;
        *stored = student.clone();
        Ok(student)
    }
}

static RECORD_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_record_id() -> RecordId {
    let id = RECORD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RecordId(format!("scr-{id:06}"))
}

/// Screening table kept as flat column maps, one row per student. The
/// `*_complete` columns are generated on every write and never accepted
/// from callers.
#[derive(Default, Clone)]
pub(crate) struct InMemoryScreeningStore {
    rows: Arc<Mutex<HashMap<StudentId, Map<String, Value>>>>,
}

impl InMemoryScreeningStore {
    fn lock(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<StudentId, Map<String, Value>>>, RepositoryError> {
        self.rows.lock().map_err(|_| poisoned("screening store"))
    }
}

impl ScreeningRepository for InMemoryScreeningStore {
    fn find_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<ScreeningRecord>, RepositoryError> {
        let guard = self.lock()?;
        guard
            .get(student_id)
            .map(ScreeningRecord::from_columns)
            .transpose()
            .map_err(RepositoryError::from)
    }

    fn save(
        &self,
        mut record: ScreeningRecord,
        mode: SaveMode,
    ) -> Result<ScreeningRecord, RepositoryError> {
        let mut guard = self.lock()?;
        let key = record.row.student_id.clone();
        let now = Utc::now();

        let stored = guard
            .get(&key)
            .map(ScreeningRecord::from_columns)
            .transpose()?;

        match (mode, stored) {
            (SaveMode::Insert, Some(_)) => {
                return Err(RepositoryError::Conflict(format!(
                    "student {} already has a screening record",
                    record.row.unique_id
                )));
            }
            (SaveMode::Insert, None) => {
                record.id = Some(next_record_id());
                record.version = 1;
                record.created_at = Some(now);
            }
            (SaveMode::Update { expected_version }, Some(current)) => {
                if current.version != expected_version {
                    return Err(RepositoryError::Conflict(format!(
                        "expected version {expected_version}, found {}",
                        current.version
                    )));
                }
                record.id = current.id;
                record.version = current.version + 1;
                record.created_at = current.created_at;
            }
            (SaveMode::Update { .. }, None) => return Err(RepositoryError::NotFound),
        }
        record.updated_at = Some(now);

        let mut columns = record.to_columns();
        for test in TestKind::ordered() {
            columns.remove(&format!("{}_complete", test.key()));
        }
        let completion = calculate_completion_status(Some(&record));
        for test in TestKind::ordered() {
            columns.insert(
                format!("{}_complete", test.key()),
                Value::Bool(completion.get(test)),
            );
        }
        record.completion = Some(completion);

        guard.insert(key, columns);
        Ok(record)
    }
}
