//! Student registry import from a district roster CSV export.

mod normalizer;
mod parser;

use chrono::NaiveDate;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::screening::{EnrollmentStatus, ExternalStudentId, Gender, StudentId, StudentRecord};
use parser::RosterRow;

pub(crate) use normalizer::title_case;

#[derive(Debug)]
pub enum RosterImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidDate { unique_id: String, value: String },
    DuplicateStudent(String),
}

impl std::fmt::Display for RosterImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterImportError::Io(err) => write!(f, "failed to read roster: {}", err),
            RosterImportError::Csv(err) => write!(f, "invalid roster CSV data: {}", err),
            RosterImportError::InvalidDate { unique_id, value } => write!(
                f,
                "student {} has an invalid dob '{}' (expected YYYY-MM-DD)",
                unique_id, value
            ),
            RosterImportError::DuplicateStudent(unique_id) => {
                write!(f, "student {} appears more than once in the roster", unique_id)
            }
        }
    }
}

impl std::error::Error for RosterImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterImportError::Io(err) => Some(err),
            RosterImportError::Csv(err) => Some(err),
            RosterImportError::InvalidDate { .. } | RosterImportError::DuplicateStudent(_) => None,
        }
    }
}

impl From<std::io::Error> for RosterImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for RosterImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub struct RosterImporter;

impl RosterImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<StudentRecord>, RosterImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<StudentRecord>, RosterImportError> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut students = Vec::new();

        for row in parser::parse_rows(reader)? {
            if !seen.insert(row.unique_id.to_ascii_lowercase()) {
                return Err(RosterImportError::DuplicateStudent(row.unique_id));
            }
            students.push(student_from_row(row)?);
        }

        debug!(count = students.len(), "roster imported");
        Ok(students)
    }
}

fn student_from_row(row: RosterRow) -> Result<StudentRecord, RosterImportError> {
    let dob = match row.dob {
        Some(raw) => Some(NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
            RosterImportError::InvalidDate {
                unique_id: row.unique_id.clone(),
                value: raw.clone(),
            }
        })?),
        None => None,
    };

    Ok(StudentRecord {
        id: StudentId(row.id),
        unique_id: ExternalStudentId(row.unique_id),
        first_name: title_case(&row.first_name),
        last_name: title_case(&row.last_name),
        grade: row.grade,
        gender: row.gender.as_deref().map(Gender::parse).unwrap_or(Gender::Unknown),
        school: row.school.unwrap_or_default(),
        teacher: row.teacher.as_deref().map(title_case),
        dob,
        status: row
            .status
            .as_deref()
            .map(EnrollmentStatus::parse)
            .unwrap_or(EnrollmentStatus::Returning),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "id,unique_id,first_name,last_name,grade,gender,school,teacher,dob,status\n";

    #[test]
    fn imports_rows_with_title_cased_names() {
        let csv = format!(
            "{HEADER}stu-1, ST0001 ,maya,HERNANDEZ,5th,Female,Lincoln Elementary,ms. rivera,2015-03-14,Returning\n\
stu-2,ST0002,leo,hernandez,Pre-K (4),male,,,,new\n"
        );

        let students = RosterImporter::from_reader(Cursor::new(csv)).expect("import succeeds");

        assert_eq!(students.len(), 2);
        let maya = &students[0];
        assert_eq!(maya.unique_id.0, "ST0001");
        assert_eq!(maya.first_name, "Maya");
        assert_eq!(maya.last_name, "Hernandez");
        assert_eq!(maya.teacher.as_deref(), Some("Ms. Rivera"));
        assert_eq!(maya.dob, NaiveDate::from_ymd_opt(2015, 3, 14));
        assert_eq!(maya.status, EnrollmentStatus::Returning);

        let leo = &students[1];
        assert_eq!(leo.gender, Gender::Male);
        assert_eq!(leo.status, EnrollmentStatus::New);
        assert!(leo.teacher.is_none());
        assert!(leo.dob.is_none());
        assert_eq!(leo.school, "");
    }

    #[test]
    fn rejects_invalid_birth_dates() {
        let csv = format!("{HEADER}stu-1,ST0001,Maya,Hernandez,5th,Female,Lincoln,,03/14/2015,New\n");

        match RosterImporter::from_reader(Cursor::new(csv)) {
            Err(RosterImportError::InvalidDate { unique_id, value }) => {
                assert_eq!(unique_id, "ST0001");
                assert_eq!(value, "03/14/2015");
            }
            other => panic!("expected invalid date, got {other:?}"),
        }
    }

    #[test]
    fn rejects_duplicate_unique_ids() {
        let csv = format!(
            "{HEADER}stu-1,ST0001,Maya,Hernandez,5th,Female,Lincoln,,,New\n\
stu-9,st0001,Maya,Hernandez,5th,Female,Lincoln,,,New\n"
        );

        assert!(matches!(
            RosterImporter::from_reader(Cursor::new(csv)),
            Err(RosterImportError::DuplicateStudent(id)) if id == "st0001"
        ));
    }

    #[test]
    fn reports_missing_columns_as_csv_errors() {
        let csv = "id,unique_id\nstu-1,ST0001\n";
        assert!(matches!(
            RosterImporter::from_reader(Cursor::new(csv)),
            Err(RosterImportError::Csv(_))
        ));
    }
}
