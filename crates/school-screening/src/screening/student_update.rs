//! Profile edits for a registered student. Edits change what the student
//! owes from now on; a screening record already created keeps its frozen
//! required flags.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use super::domain::{EnrollmentStatus, Gender, StudentRecord};
use super::intake::ValidationError;
use super::submission::blank_date_as_none;
use crate::roster::title_case;

/// Fields to change on a student. An absent field is left alone; `null` or a
/// blank string clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentUpdate {
    #[serde(default, deserialize_with = "present_text")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present_text")]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present_text")]
    pub grade: Option<Option<String>>,
    #[serde(default, deserialize_with = "present_text")]
    pub gender: Option<Option<String>>,
    #[serde(default, deserialize_with = "present_text")]
    pub school: Option<Option<String>>,
    #[serde(default, deserialize_with = "present_text")]
    pub teacher: Option<Option<String>>,
    #[serde(default, deserialize_with = "present_date")]
    pub dob: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "present_text")]
    pub status: Option<Option<String>>,
}

impl StudentUpdate {
    /// Edited copy of `student`. Names and grade cannot be cleared; a cleared
    /// gender reads as unknown and a cleared status as returning.
    pub fn apply(self, mut student: StudentRecord) -> Result<StudentRecord, ValidationError> {
        if let Some(first_name) = self.first_name {
            student.first_name = required("firstName", first_name).map(|name| title_case(&name))?;
        }
        if let Some(last_name) = self.last_name {
            student.last_name = required("lastName", last_name).map(|name| title_case(&name))?;
        }
        if let Some(grade) = self.grade {
            student.grade = required("grade", grade)?;
        }
        if let Some(gender) = self.gender {
            student.gender = gender.as_deref().map_or(Gender::Unknown, Gender::parse);
        }
        if let Some(school) = self.school {
            student.school = school.unwrap_or_default();
        }
        if let Some(teacher) = self.teacher {
            student.teacher = teacher.as_deref().map(title_case);
        }
        if let Some(dob) = self.dob {
            student.dob = dob;
        }
        if let Some(status) = self.status {
            student.status = status
                .as_deref()
                .map_or(EnrollmentStatus::Returning, EnrollmentStatus::parse);
        }
        Ok(student)
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, ValidationError> {
    value.ok_or(ValidationError::BlankStudentField(field))
}

fn present_text<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(Some(
        value
            .map(|raw| raw.trim().to_string())
            .filter(|trimmed| !trimmed.is_empty()),
    ))
}

fn present_date<'de, D>(deserializer: D) -> Result<Option<Option<NaiveDate>>, D::Error>
where
    D: Deserializer<'de>,
{
    blank_date_as_none(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screening::domain::{ExternalStudentId, StudentId};
    use serde_json::json;

    fn student() -> StudentRecord {
        StudentRecord {
            id: StudentId("stu-1".to_string()),
            unique_id: ExternalStudentId("ST0001".to_string()),
            first_name: "Maya".to_string(),
            last_name: "Hernandez".to_string(),
            grade: "5th".to_string(),
            gender: Gender::Female,
            school: "Lincoln Elementary".to_string(),
            teacher: Some("Ms. Rivera".to_string()),
            dob: NaiveDate::from_ymd_opt(2015, 3, 14),
            status: EnrollmentStatus::New,
        }
    }

    fn update(payload: serde_json::Value) -> StudentUpdate {
        serde_json::from_value(payload).expect("update payload")
    }

    #[test]
    fn absent_fields_are_left_alone() {
        let edited = update(json!({ "grade": "6th" }))
            .apply(student())
            .expect("edit applies");

        assert_eq!(edited.grade, "6th");
        assert_eq!(edited.teacher.as_deref(), Some("Ms. Rivera"));
        assert_eq!(edited.dob, NaiveDate::from_ymd_opt(2015, 3, 14));
        assert_eq!(edited.status, EnrollmentStatus::New);
    }

    #[test]
    fn names_and_teacher_are_title_cased() {
        let edited = update(json!({
            "firstName": "  mAYA ",
            "lastName": "de la cruz",
            "teacher": "mr. okafor"
        }))
        .apply(student())
        .expect("edit applies");

        assert_eq!(edited.first_name, "Maya");
        assert_eq!(edited.last_name, "De La Cruz");
        assert_eq!(edited.teacher.as_deref(), Some("Mr. Okafor"));
    }

    #[test]
    fn null_or_blank_clears_optional_fields() {
        let edited = update(json!({
            "teacher": null,
            "dob": "",
            "gender": " ",
            "status": null,
            "school": null
        }))
        .apply(student())
        .expect("edit applies");

        assert_eq!(edited.teacher, None);
        assert_eq!(edited.dob, None);
        assert_eq!(edited.gender, Gender::Unknown);
        assert_eq!(edited.status, EnrollmentStatus::Returning);
        assert_eq!(edited.school, "");
    }

    #[test]
    fn names_and_grade_cannot_be_cleared() {
        assert_eq!(
            update(json!({ "lastName": "" })).apply(student()),
            Err(ValidationError::BlankStudentField("lastName"))
        );
        assert_eq!(
            update(json!({ "grade": null })).apply(student()),
            Err(ValidationError::BlankStudentField("grade"))
        );
    }
}
