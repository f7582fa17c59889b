use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serialize};

use super::domain::{Phase, TestKind};
use super::record::{parse_date, Field, FieldSet, FieldValue};

/// Which visit a submission's free-text `notes` belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScreeningType {
    Initial,
    Rescreen,
    Unrecognized(String),
}

impl ScreeningType {
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Initial => Some(Phase::Initial),
            Self::Rescreen => Some(Phase::Rescreen),
            Self::Unrecognized(_) => None,
        }
    }
}

impl From<String> for ScreeningType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "initial" => Self::Initial,
            "rescreen" => Self::Rescreen,
            _ => Self::Unrecognized(value),
        }
    }
}

impl From<ScreeningType> for String {
    fn from(value: ScreeningType) -> Self {
        match value {
            ScreeningType::Initial => "initial".to_string(),
            ScreeningType::Rescreen => "rescreen".to_string(),
            ScreeningType::Unrecognized(raw) => raw,
        }
    }
}

/// Student details as typed on the screening form at the time of the visit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemographicSnapshot {
    #[serde(default)]
    pub student_first_name: Option<String>,
    #[serde(default)]
    pub student_last_name: Option<String>,
    #[serde(default)]
    pub student_grade: Option<String>,
    #[serde(default)]
    pub student_gender: Option<String>,
    #[serde(default)]
    pub student_school: Option<String>,
    #[serde(default)]
    pub student_teacher: Option<String>,
    #[serde(default, deserialize_with = "blank_date_as_none")]
    pub student_dob: Option<NaiveDate>,
    #[serde(default)]
    pub student_status: Option<String>,
}

impl DemographicSnapshot {
    fn normalized(self) -> Self {
        Self {
            student_first_name: clean_text(self.student_first_name),
            student_last_name: clean_text(self.student_last_name),
            student_grade: clean_text(self.student_grade),
            student_gender: clean_text(self.student_gender),
            student_school: clean_text(self.student_school),
            student_teacher: clean_text(self.student_teacher),
            student_dob: self.student_dob,
            student_status: clean_text(self.student_status),
        }
    }
}

/// Partial screening update for one student. Every absent field means
/// "no information" and never clears a stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreeningSubmission {
    #[serde(rename = "uniqueId", default)]
    pub unique_id: Option<String>,
    #[serde(
        rename = "screeningDate",
        default,
        deserialize_with = "blank_date_as_none"
    )]
    pub screening_date: Option<NaiveDate>,
    #[serde(rename = "screeningType", default)]
    pub screening_type: Option<ScreeningType>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub was_absent: Option<bool>,
    #[serde(flatten)]
    pub student: DemographicSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision: Option<PhasePair<VisionReading>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hearing: Option<PhasePair<HearingReading>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acanthosis: Option<PhasePair<AcanthosisReading>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoliosis: Option<PhasePair<ScoliosisReading>>,
}

impl ScreeningSubmission {
    /// Trim free text and drop blanks so they read as absent.
    pub fn normalized(self) -> Self {
        Self {
            unique_id: clean_text(self.unique_id),
            screening_date: self.screening_date,
            screening_type: self.screening_type,
            notes: clean_text(self.notes),
            was_absent: self.was_absent,
            student: self.student.normalized(),
            vision: self.vision.map(PhasePair::normalized),
            hearing: self.hearing.map(PhasePair::normalized),
            acanthosis: self.acanthosis.map(PhasePair::normalized),
            scoliosis: self.scoliosis.map(PhasePair::normalized),
        }
    }

    /// Every raw `result` value carried by the submission.
    pub fn results(&self) -> Vec<(TestKind, Phase, &str)> {
        let mut results = Vec::new();
        collect_results(&mut results, TestKind::Vision, self.vision.as_ref());
        collect_results(&mut results, TestKind::Hearing, self.hearing.as_ref());
        collect_results(&mut results, TestKind::Acanthosis, self.acanthosis.as_ref());
        collect_results(&mut results, TestKind::Scoliosis, self.scoliosis.as_ref());
        results
    }
}

/// Form dates arrive as `YYYY-MM-DD` strings; blank ones mean "not supplied".
pub(crate) fn blank_date_as_none<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => {
            parse_date(&raw).map(Some).map_err(de::Error::custom)
        }
        _ => Ok(None),
    }
}

fn collect_results<'a, R: PhaseReading>(
    results: &mut Vec<(TestKind, Phase, &'a str)>,
    test: TestKind,
    pair: Option<&'a PhasePair<R>>,
) {
    let Some(pair) = pair else {
        return;
    };
    for (phase, reading) in pair.readings() {
        if let Some(result) = reading.result() {
            results.push((test, phase, result));
        }
    }
}

/// Initial and rescreen readings for one test. Only these two phase keys are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhasePair<R> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<R>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescreen: Option<R>,
}

impl<R: PhaseReading> PhasePair<R> {
    pub fn get(&self, phase: Phase) -> Option<&R> {
        match phase {
            Phase::Initial => self.initial.as_ref(),
            Phase::Rescreen => self.rescreen.as_ref(),
        }
    }

    pub fn readings(&self) -> impl Iterator<Item = (Phase, &R)> {
        Phase::ordered()
            .into_iter()
            .filter_map(move |phase| self.get(phase).map(|reading| (phase, reading)))
    }

    fn normalized(self) -> Self {
        Self {
            initial: self.initial.map(PhaseReading::normalized),
            rescreen: self.rescreen.map(PhaseReading::normalized),
        }
    }
}

/// Measurements captured during a single visit for one test type.
pub trait PhaseReading {
    /// The screener's raw result, if one was recorded.
    fn result(&self) -> Option<&str>;
    /// Present fields keyed by column field name.
    fn fields(&self) -> FieldSet;
    fn normalized(self) -> Self;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionReading {
    #[serde(default)]
    pub screener: Option<String>,
    #[serde(default, deserialize_with = "blank_date_as_none")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub glasses: Option<FieldValue>,
    #[serde(default)]
    pub right_eye: Option<FieldValue>,
    #[serde(default)]
    pub left_eye: Option<FieldValue>,
    #[serde(default)]
    pub result: Option<String>,
}

impl PhaseReading for VisionReading {
    fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    fn fields(&self) -> FieldSet {
        let mut fields = common_fields(&self.screener, self.date, &self.result);
        insert_value(&mut fields, Field::Glasses, &self.glasses);
        insert_value(&mut fields, Field::RightEye, &self.right_eye);
        insert_value(&mut fields, Field::LeftEye, &self.left_eye);
        fields
    }

    fn normalized(self) -> Self {
        Self {
            screener: clean_text(self.screener),
            date: self.date,
            glasses: clean_value(self.glasses),
            right_eye: clean_value(self.right_eye),
            left_eye: clean_value(self.left_eye),
            result: clean_text(self.result),
        }
    }
}

/// Pure-tone sweep at 1000/2000/4000 Hz per ear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HearingReading {
    #[serde(default)]
    pub screener: Option<String>,
    #[serde(default, deserialize_with = "blank_date_as_none")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(rename = "right1000", default)]
    pub right_1000: Option<FieldValue>,
    #[serde(rename = "right2000", default)]
    pub right_2000: Option<FieldValue>,
    #[serde(rename = "right4000", default)]
    pub right_4000: Option<FieldValue>,
    #[serde(rename = "left1000", default)]
    pub left_1000: Option<FieldValue>,
    #[serde(rename = "left2000", default)]
    pub left_2000: Option<FieldValue>,
    #[serde(rename = "left4000", default)]
    pub left_4000: Option<FieldValue>,
}

impl PhaseReading for HearingReading {
    fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    fn fields(&self) -> FieldSet {
        let mut fields = common_fields(&self.screener, self.date, &self.result);
        insert_value(&mut fields, Field::Right1000, &self.right_1000);
        insert_value(&mut fields, Field::Right2000, &self.right_2000);
        insert_value(&mut fields, Field::Right4000, &self.right_4000);
        insert_value(&mut fields, Field::Left1000, &self.left_1000);
        insert_value(&mut fields, Field::Left2000, &self.left_2000);
        insert_value(&mut fields, Field::Left4000, &self.left_4000);
        fields
    }

    fn normalized(self) -> Self {
        Self {
            screener: clean_text(self.screener),
            date: self.date,
            result: clean_text(self.result),
            right_1000: clean_value(self.right_1000),
            right_2000: clean_value(self.right_2000),
            right_4000: clean_value(self.right_4000),
            left_1000: clean_value(self.left_1000),
            left_2000: clean_value(self.left_2000),
            left_4000: clean_value(self.left_4000),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcanthosisReading {
    #[serde(default)]
    pub screener: Option<String>,
    #[serde(default, deserialize_with = "blank_date_as_none")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub result: Option<String>,
}

impl PhaseReading for AcanthosisReading {
    fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    fn fields(&self) -> FieldSet {
        common_fields(&self.screener, self.date, &self.result)
    }

    fn normalized(self) -> Self {
        Self {
            screener: clean_text(self.screener),
            date: self.date,
            result: clean_text(self.result),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoliosisReading {
    #[serde(default)]
    pub screener: Option<String>,
    #[serde(default, deserialize_with = "blank_date_as_none")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
}

impl PhaseReading for ScoliosisReading {
    fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    fn fields(&self) -> FieldSet {
        let mut fields = common_fields(&self.screener, self.date, &self.result);
        if let Some(observations) = &self.observations {
            fields.insert(Field::Observations, FieldValue::Text(observations.clone()));
        }
        fields
    }

    fn normalized(self) -> Self {
        Self {
            screener: clean_text(self.screener),
            date: self.date,
            observations: clean_text(self.observations),
            result: clean_text(self.result),
        }
    }
}

fn common_fields(
    screener: &Option<String>,
    date: Option<NaiveDate>,
    result: &Option<String>,
) -> FieldSet {
    let mut fields = FieldSet::new();
    if let Some(screener) = screener {
        fields.insert(Field::Screener, FieldValue::Text(screener.clone()));
    }
    if let Some(date) = date {
        fields.insert(Field::Date, FieldValue::Date(date));
    }
    if let Some(result) = result {
        fields.insert(Field::Result, FieldValue::Text(result.clone()));
    }
    fields
}

fn insert_value(fields: &mut FieldSet, field: Field, value: &Option<FieldValue>) {
    if let Some(value) = value {
        fields.insert(field, value.clone());
    }
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

fn clean_value(value: Option<FieldValue>) -> Option<FieldValue> {
    match value {
        Some(FieldValue::Text(raw)) => clean_text(Some(raw)).map(FieldValue::Text),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_form_payload() {
        let payload = json!({
            "uniqueId": "st0001",
            "screeningDate": "2025-10-01",
            "screeningType": "initial",
            "student_grade": "5th",
            "student_gender": "Female",
            "vision": {
                "initial": {
                    "screener": "Nurse Joy",
                    "rightEye": "20/20",
                    "glasses": false,
                    "result": "pass"
                }
            },
            "hearing": {
                "rescreen": { "right1000": 20, "left4000": "fail", "result": "fail" }
            }
        });

        let submission: ScreeningSubmission =
            serde_json::from_value(payload).expect("payload deserializes");

        assert_eq!(submission.unique_id.as_deref(), Some("st0001"));
        assert_eq!(submission.screening_type, Some(ScreeningType::Initial));
        assert_eq!(submission.student.student_grade.as_deref(), Some("5th"));
        let vision = submission.vision.as_ref().expect("vision present");
        let initial = vision.initial.as_ref().expect("initial present");
        assert_eq!(initial.right_eye, Some(FieldValue::Text("20/20".to_string())));
        assert_eq!(initial.glasses, Some(FieldValue::Flag(false)));
        let hearing = submission.hearing.as_ref().expect("hearing present");
        let rescreen = hearing.rescreen.as_ref().expect("rescreen present");
        assert_eq!(rescreen.right_1000, Some(FieldValue::Number(20.into())));
        assert_eq!(
            rescreen.left_4000,
            Some(FieldValue::Text("fail".to_string()))
        );
    }

    #[test]
    fn blank_form_dates_read_as_absent() {
        let payload = json!({
            "uniqueId": "st0001",
            "screeningDate": " ",
            "student_dob": "",
            "vision": { "initial": { "date": "", "result": "pass" } },
            "acanthosis": { "rescreen": { "date": "2025-10-14", "result": "fail" } }
        });

        let submission: ScreeningSubmission =
            serde_json::from_value(payload).expect("blank dates are accepted");

        assert_eq!(submission.screening_date, None);
        assert_eq!(submission.student.student_dob, None);
        let vision = submission.vision.as_ref().and_then(|pair| pair.initial.as_ref());
        assert_eq!(vision.and_then(|reading| reading.date), None);
        let acanthosis = submission
            .acanthosis
            .as_ref()
            .and_then(|pair| pair.rescreen.as_ref())
            .expect("acanthosis rescreen");
        assert_eq!(acanthosis.date, NaiveDate::from_ymd_opt(2025, 10, 14));
    }

    #[test]
    fn malformed_dates_are_still_rejected() {
        let payload = json!({
            "uniqueId": "st0001",
            "screeningDate": "10/01/2025"
        });

        let parsed = serde_json::from_value::<ScreeningSubmission>(payload);
        assert!(parsed.is_err(), "non ISO dates must not be accepted");
    }

    #[test]
    fn rejects_legacy_day_one_phase_key() {
        let payload = json!({
            "uniqueId": "st0001",
            "vision": { "day1": { "result": "pass" } }
        });

        let parsed = serde_json::from_value::<ScreeningSubmission>(payload);
        assert!(parsed.is_err(), "legacy phase key must not be accepted");
    }

    #[test]
    fn normalization_trims_and_drops_blanks() {
        let submission = ScreeningSubmission {
            unique_id: Some("  st0002 ".to_string()),
            notes: Some("   ".to_string()),
            scoliosis: Some(PhasePair {
                initial: Some(ScoliosisReading {
                    screener: Some(" Coach ".to_string()),
                    observations: Some(String::new()),
                    result: Some(" Pass ".to_string()),
                    ..ScoliosisReading::default()
                }),
                rescreen: None,
            }),
            ..ScreeningSubmission::default()
        }
        .normalized();

        assert_eq!(submission.unique_id.as_deref(), Some("st0002"));
        assert!(submission.notes.is_none());
        let reading = submission
            .scoliosis
            .as_ref()
            .and_then(|pair| pair.initial.as_ref())
            .expect("scoliosis reading");
        assert_eq!(reading.screener.as_deref(), Some("Coach"));
        assert!(reading.observations.is_none());
        assert_eq!(reading.result(), Some("Pass"));
    }

    #[test]
    fn unrecognized_screening_type_is_preserved() {
        let parsed: ScreeningType = serde_json::from_value(json!("followup")).expect("string");
        assert_eq!(parsed, ScreeningType::Unrecognized("followup".to_string()));
        assert_eq!(parsed.phase(), None);
        let rescreen: ScreeningType = serde_json::from_value(json!("Rescreen")).expect("string");
        assert_eq!(rescreen.phase(), Some(Phase::Rescreen));
    }
}
