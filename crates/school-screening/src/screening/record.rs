//! Screening rows as the merge engine sees them (a nested test → phase →
//! field map) and as storage sees them (flat `{test}_{phase}_{field}`
//! columns). Conversion happens only in `to_columns` / `from_columns`.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

use super::domain::{
    CompletionSet, ExternalStudentId, OverallResult, Phase, RecordId, RequirementSet, StudentId,
    TestKind,
};
use super::submission::DemographicSnapshot;

/// Per-visit measurement name, as used in the column suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Screener,
    Date,
    Result,
    Glasses,
    RightEye,
    LeftEye,
    Right1000,
    Right2000,
    Right4000,
    Left1000,
    Left2000,
    Left4000,
    Observations,
}

impl Field {
    pub const fn column(self) -> &'static str {
        match self {
            Self::Screener => "screener",
            Self::Date => "date",
            Self::Result => "result",
            Self::Glasses => "glasses",
            Self::RightEye => "right_eye",
            Self::LeftEye => "left_eye",
            Self::Right1000 => "right_1000",
            Self::Right2000 => "right_2000",
            Self::Right4000 => "right_4000",
            Self::Left1000 => "left_1000",
            Self::Left2000 => "left_2000",
            Self::Left4000 => "left_4000",
            Self::Observations => "observations",
        }
    }

    /// Fields recorded for each test type.
    pub const fn for_test(test: TestKind) -> &'static [Field] {
        match test {
            TestKind::Vision => &[
                Self::Screener,
                Self::Date,
                Self::Glasses,
                Self::RightEye,
                Self::LeftEye,
                Self::Result,
            ],
            TestKind::Hearing => &[
                Self::Screener,
                Self::Date,
                Self::Result,
                Self::Right1000,
                Self::Right2000,
                Self::Right4000,
                Self::Left1000,
                Self::Left2000,
                Self::Left4000,
            ],
            TestKind::Acanthosis => &[Self::Screener, Self::Date, Self::Result],
            TestKind::Scoliosis => &[Self::Screener, Self::Date, Self::Observations, Self::Result],
        }
    }
}

pub fn column_name(test: TestKind, phase: Phase, field: Field) -> String {
    format!("{}_{}_{}", test.key(), phase.key(), field.column())
}

/// Stored measurement value. Dates are kept typed; everything else is
/// whatever the screening form sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Number(Number),
    Text(String),
    Date(NaiveDate),
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Number(Number),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Flag(flag) => Self::Flag(flag),
            Raw::Number(number) => Self::Number(number),
            Raw::Text(text) => Self::Text(text),
        })
    }
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Flag(flag) => Value::Bool(*flag),
            Self::Number(number) => Value::Number(number.clone()),
            Self::Text(text) => Value::String(text.clone()),
            Self::Date(date) => Value::String(date.format("%Y-%m-%d").to_string()),
        }
    }

    fn from_json(field: Field, value: &Value) -> Result<Option<Self>, String> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(flag) => Ok(Some(Self::Flag(*flag))),
            Value::Number(number) => Ok(Some(Self::Number(number.clone()))),
            Value::String(text) if field == Field::Date => {
                parse_date(text).map(|date| Some(Self::Date(date)))
            }
            Value::String(text) => Ok(Some(Self::Text(text.clone()))),
            Value::Array(_) | Value::Object(_) => Err("expected a scalar value".to_string()),
        }
    }
}

pub type FieldSet = BTreeMap<Field, FieldValue>;

type Columns = Map<String, Value>;

/// Recorded measurements keyed test → phase → field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSheet {
    tests: BTreeMap<TestKind, BTreeMap<Phase, FieldSet>>,
}

impl ResultSheet {
    pub fn get(&self, test: TestKind, phase: Phase, field: Field) -> Option<&FieldValue> {
        self.phase(test, phase).and_then(|fields| fields.get(&field))
    }

    pub fn phase(&self, test: TestKind, phase: Phase) -> Option<&FieldSet> {
        self.tests.get(&test).and_then(|phases| phases.get(&phase))
    }

    /// Raw result text for a test phase, if recorded.
    pub fn result(&self, test: TestKind, phase: Phase) -> Option<&str> {
        self.get(test, phase, Field::Result)
            .and_then(FieldValue::as_text)
    }

    pub fn set(&mut self, test: TestKind, phase: Phase, field: Field, value: FieldValue) {
        self.tests
            .entry(test)
            .or_default()
            .entry(phase)
            .or_default()
            .insert(field, value);
    }

    pub fn insert_phase(&mut self, test: TestKind, phase: Phase, fields: FieldSet) {
        for (field, value) in fields {
            self.set(test, phase, field, value);
        }
    }

    /// Every field present in `incoming` replaces ours; fields it lacks are kept.
    pub fn overlay(&mut self, incoming: ResultSheet) {
        for (test, phases) in incoming.tests {
            for (phase, fields) in phases {
                self.insert_phase(test, phase, fields);
            }
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (TestKind, Phase, Field, &FieldValue)> {
        self.tests.iter().flat_map(|(test, phases)| {
            phases.iter().flat_map(move |(phase, fields)| {
                fields
                    .iter()
                    .map(move |(field, value)| (*test, *phase, *field, value))
            })
        })
    }

    pub fn is_empty(&self) -> bool {
        self.tests.values().all(|phases| phases.values().all(BTreeMap::is_empty))
    }
}

/// Row produced for one submission, before merging with any stored record.
/// `None` means "not supplied" and never overwrites a stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreeningRow {
    pub student_id: StudentId,
    pub unique_id: ExternalStudentId,
    pub student: DemographicSnapshot,
    pub screening_year: i32,
    pub initial_screening_date: NaiveDate,
    pub was_absent: bool,
    pub initial_notes: Option<String>,
    pub rescreen_notes: Option<String>,
    /// Only present when the row creates the record.
    pub required: Option<RequirementSet>,
    pub results: ResultSheet,
    pub vision_overall: Option<OverallResult>,
    pub hearing_overall: Option<OverallResult>,
}

impl ScreeningRow {
    pub fn overall(&self, test: TestKind) -> Option<OverallResult> {
        match test {
            TestKind::Vision => self.vision_overall,
            TestKind::Hearing => self.hearing_overall,
            TestKind::Acanthosis | TestKind::Scoliosis => None,
        }
    }

    fn write_columns(&self, columns: &mut Columns) {
        columns.insert("student_id".into(), Value::String(self.student_id.0.clone()));
        columns.insert("unique_id".into(), Value::String(self.unique_id.0.clone()));

        let student = &self.student;
        put_text(columns, "student_first_name", &student.student_first_name);
        put_text(columns, "student_last_name", &student.student_last_name);
        put_text(columns, "student_grade", &student.student_grade);
        put_text(columns, "student_gender", &student.student_gender);
        put_text(columns, "student_school", &student.student_school);
        put_text(columns, "student_teacher", &student.student_teacher);
        columns.insert(
            "student_dob".into(),
            student
                .student_dob
                .map(|dob| Value::String(dob.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null),
        );
        put_text(columns, "student_status", &student.student_status);

        columns.insert("screening_year".into(), Value::from(self.screening_year));
        columns.insert(
            "initial_screening_date".into(),
            Value::String(self.initial_screening_date.format("%Y-%m-%d").to_string()),
        );
        columns.insert("was_absent".into(), Value::Bool(self.was_absent));
        put_text(columns, "initial_notes", &self.initial_notes);
        put_text(columns, "rescreen_notes", &self.rescreen_notes);

        for test in TestKind::ordered() {
            let required = self
                .required
                .map(|flags| Value::Bool(flags.get(test)))
                .unwrap_or(Value::Null);
            columns.insert(format!("{}_required", test.key()), required);
        }

        for (test, phase, field, value) in self.results.entries() {
            columns.insert(column_name(test, phase, field), value.to_json());
        }

        for (name, overall) in [
            ("vision_overall", self.vision_overall),
            ("hearing_overall", self.hearing_overall),
        ] {
            let value = overall
                .map(|result| Value::String(result.label().to_string()))
                .unwrap_or(Value::Null);
            columns.insert(name.into(), value);
        }
    }

    fn read_columns(columns: &Columns) -> Result<Self, RecordDecodeError> {
        let student = DemographicSnapshot {
            student_first_name: text_column(columns, "student_first_name")?,
            student_last_name: text_column(columns, "student_last_name")?,
            student_grade: text_column(columns, "student_grade")?,
            student_gender: text_column(columns, "student_gender")?,
            student_school: text_column(columns, "student_school")?,
            student_teacher: text_column(columns, "student_teacher")?,
            student_dob: date_column(columns, "student_dob")?,
            student_status: text_column(columns, "student_status")?,
        };

        let screening_year = match columns.get("screening_year") {
            Some(Value::Number(number)) => number
                .as_i64()
                .and_then(|year| i32::try_from(year).ok())
                .ok_or_else(|| invalid("screening_year", "expected a calendar year"))?,
            Some(Value::Null) | None => {
                return Err(RecordDecodeError::MissingColumn("screening_year"))
            }
            Some(_) => return Err(invalid("screening_year", "expected a number")),
        };

        let mut required_flags = RequirementSet::default();
        let mut any_required = false;
        for test in TestKind::ordered() {
            if let Some(flag) = bool_column(columns, &format!("{}_required", test.key()))? {
                required_flags.set(test, flag);
                any_required = true;
            }
        }

        Ok(Self {
            student_id: StudentId(required_text(columns, "student_id")?),
            unique_id: ExternalStudentId(required_text(columns, "unique_id")?),
            student,
            screening_year,
            initial_screening_date: date_column(columns, "initial_screening_date")?
                .ok_or(RecordDecodeError::MissingColumn("initial_screening_date"))?,
            was_absent: bool_column(columns, "was_absent")?.unwrap_or(false),
            initial_notes: text_column(columns, "initial_notes")?,
            rescreen_notes: text_column(columns, "rescreen_notes")?,
            required: any_required.then_some(required_flags),
            results: read_result_sheet(columns)?,
            vision_overall: overall_column(columns, "vision_overall")?,
            hearing_overall: overall_column(columns, "hearing_overall")?,
        })
    }
}

/// Persisted screening record, one per student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreeningRecord {
    /// Assigned by storage on insert.
    pub id: Option<RecordId>,
    /// Bumped by storage on every write; updates must present the version they read.
    pub version: u64,
    pub row: ScreeningRow,
    /// Generated `*_complete` columns as last derived by storage. Never written back.
    pub completion: Option<CompletionSet>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ScreeningRecord {
    /// Unsaved record wrapping a freshly built row.
    pub fn draft(row: ScreeningRow) -> Self {
        Self {
            id: None,
            version: 0,
            row,
            completion: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn to_columns(&self) -> Map<String, Value> {
        let mut columns = Map::new();
        columns.insert(
            "id".into(),
            self.id
                .as_ref()
                .map(|id| Value::String(id.0.clone()))
                .unwrap_or(Value::Null),
        );
        columns.insert("version".into(), Value::from(self.version));
        self.row.write_columns(&mut columns);

        if let Some(completion) = self.completion {
            for test in TestKind::ordered() {
                columns.insert(
                    format!("{}_complete", test.key()),
                    Value::Bool(completion.get(test)),
                );
            }
        }

        for (name, timestamp) in [
            ("created_at", self.created_at),
            ("updated_at", self.updated_at),
        ] {
            let value = timestamp
                .map(|ts| Value::String(ts.to_rfc3339()))
                .unwrap_or(Value::Null);
            columns.insert(name.into(), value);
        }

        columns
    }

    pub fn from_columns(columns: &Map<String, Value>) -> Result<Self, RecordDecodeError> {
        let version = match columns.get("version") {
            Some(Value::Number(number)) => number
                .as_u64()
                .ok_or_else(|| invalid("version", "expected an unsigned integer"))?,
            Some(Value::Null) | None => 0,
            Some(_) => return Err(invalid("version", "expected a number")),
        };

        let mut completion = CompletionSet::default();
        let mut has_completion = false;
        for test in TestKind::ordered() {
            if let Some(flag) = bool_column(columns, &format!("{}_complete", test.key()))? {
                completion.set(test, flag);
                has_completion = true;
            }
        }

        Ok(Self {
            id: text_column(columns, "id")?.map(RecordId),
            version,
            row: ScreeningRow::read_columns(columns)?,
            completion: has_completion.then_some(completion),
            created_at: timestamp_column(columns, "created_at")?,
            updated_at: timestamp_column(columns, "updated_at")?,
        })
    }
}

impl Serialize for ScreeningRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_columns().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ScreeningRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let columns = Map::<String, Value>::deserialize(deserializer)?;
        Self::from_columns(&columns).map_err(serde::de::Error::custom)
    }
}

/// A persisted row that cannot be read back into a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordDecodeError {
    #[error("screening record is missing column `{0}`")]
    MissingColumn(&'static str),
    #[error("screening record column `{column}` is invalid: {reason}")]
    InvalidColumn { column: String, reason: String },
}

fn invalid(column: &str, reason: &str) -> RecordDecodeError {
    RecordDecodeError::InvalidColumn {
        column: column.to_string(),
        reason: reason.to_string(),
    }
}

fn put_text(columns: &mut Columns, name: &str, value: &Option<String>) {
    let value = value.clone().map(Value::String).unwrap_or(Value::Null);
    columns.insert(name.to_string(), value);
}

fn text_column(columns: &Columns, name: &str) -> Result<Option<String>, RecordDecodeError> {
    match columns.get(name) {
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(invalid(name, "expected text")),
    }
}

fn required_text(columns: &Columns, name: &'static str) -> Result<String, RecordDecodeError> {
    text_column(columns, name)?.ok_or(RecordDecodeError::MissingColumn(name))
}

fn bool_column(columns: &Columns, name: &str) -> Result<Option<bool>, RecordDecodeError> {
    match columns.get(name) {
        Some(Value::Bool(flag)) => Ok(Some(*flag)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(invalid(name, "expected a boolean")),
    }
}

fn date_column(columns: &Columns, name: &str) -> Result<Option<NaiveDate>, RecordDecodeError> {
    text_column(columns, name)?
        .map(|raw| parse_date(&raw).map_err(|reason| invalid(name, &reason)))
        .transpose()
}

fn timestamp_column(
    columns: &Columns,
    name: &str,
) -> Result<Option<DateTime<Utc>>, RecordDecodeError> {
    text_column(columns, name)?
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|err| invalid(name, &err.to_string()))
        })
        .transpose()
}

fn overall_column(
    columns: &Columns,
    name: &str,
) -> Result<Option<OverallResult>, RecordDecodeError> {
    match text_column(columns, name)? {
        Some(raw) => OverallResult::normalize(&raw)
            .map(Some)
            .ok_or_else(|| invalid(name, "expected PASS or FAIL")),
        None => Ok(None),
    }
}

fn read_result_sheet(columns: &Columns) -> Result<ResultSheet, RecordDecodeError> {
    let mut sheet = ResultSheet::default();
    for test in TestKind::ordered() {
        for phase in Phase::ordered() {
            for field in Field::for_test(test) {
                let name = column_name(test, phase, *field);
                let Some(raw) = columns.get(&name) else {
                    continue;
                };
                let value = FieldValue::from_json(*field, raw)
                    .map_err(|reason| invalid(&name, &reason))?;
                if let Some(value) = value {
                    sheet.set(test, phase, *field, value);
                }
            }
        }
    }
    Ok(sheet)
}

/// Parse a `YYYY-MM-DD` calendar date, ignoring surrounding whitespace.
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
