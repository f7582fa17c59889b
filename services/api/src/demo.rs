use crate::infra::{InMemoryScreeningStore, InMemoryStudentDirectory};
use chrono::{Local, NaiveDate};
use clap::Args;
use school_screening::error::AppError;
use school_screening::roster::RosterImporter;
use school_screening::screening::{
    calculate_completion_status, parse_date, DemographicSnapshot, EnrollmentStatus,
    ExternalStudentId, Gender, HearingReading, NotesPolicy, PhasePair, RequirementSet,
    ScreeningRepository, ScreeningService, ScreeningSubmission, ScreeningType, StudentId,
    StudentProfile, StudentRecord, TestKind, VisionReading,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct RequirementsArgs {
    /// Grade label as it appears on the roster (e.g. "5th", "Pre-K (4)")
    #[arg(long)]
    pub(crate) grade: String,
    /// Male, Female, Other
    #[arg(long, default_value = "Unknown")]
    pub(crate) gender: String,
    /// New or Returning
    #[arg(long, default_value = "New")]
    pub(crate) status: String,
    /// Date of birth (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) dob: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub(crate) struct RosterArgs {
    /// Roster CSV export
    #[arg(long)]
    pub(crate) roster: PathBuf,
}

pub(crate) fn run_requirements(args: RequirementsArgs) -> Result<(), AppError> {
    let profile = StudentProfile {
        grade: args.grade,
        gender: Gender::parse(&args.gender),
        status: EnrollmentStatus::parse(&args.status),
        date_of_birth: args.dob,
    };

    println!(
        "{} | {} | {}",
        profile.grade,
        profile.gender.label(),
        profile.status.label()
    );
    println!("Required screenings: {}", describe(&profile.requirements()));
    Ok(())
}

pub(crate) fn run_roster_report(args: RosterArgs) -> Result<(), AppError> {
    let students = RosterImporter::from_path(&args.roster)?;
    println!("{} students in {}", students.len(), args.roster.display());

    let mut counts = [0usize; 4];
    for student in &students {
        let required = student.profile().requirements();
        for (index, test) in TestKind::ordered().into_iter().enumerate() {
            if required.get(test) {
                counts[index] += 1;
            }
        }
        println!(
            "- {} {} {} ({}, {}): {}",
            student.unique_id,
            student.first_name,
            student.last_name,
            student.grade,
            student.school,
            describe(&required)
        );
    }

    println!("Totals:");
    for (index, test) in TestKind::ordered().into_iter().enumerate() {
        println!("  - {}: {}", test.label(), counts[index]);
    }
    Ok(())
}

pub(crate) fn run_demo() -> Result<(), AppError> {
    let today = Local::now().date_naive();
    let student = demo_student();
    let directory = Arc::new(InMemoryStudentDirectory::from_students(vec![student.clone()]));
    let store = Arc::new(InMemoryScreeningStore::default());
    let service = ScreeningService::new(directory, store.clone(), NotesPolicy::Drop);

    println!("School screening demo");
    println!(
        "- Student {} {} {} ({} {}, {})",
        student.unique_id,
        student.first_name,
        student.last_name,
        student.grade,
        student.gender.label(),
        student.status.label()
    );
    println!(
        "  Required screenings: {}",
        describe(&student.profile().requirements())
    );

    for (label, submission) in [
        ("Visit 1: vision, initial", vision_visit(&student, today)),
        ("Visit 2: hearing, rescreen", hearing_visit(&student, today)),
    ] {
        match service.submit(submission) {
            Ok(outcome) => println!(
                "\n{} -> {} (version {})",
                label,
                outcome.status.message(),
                outcome.record.version
            ),
            Err(err) => {
                println!("\n{} -> rejected: {}", label, err);
                return Ok(());
            }
        }
    }

    let record = match store.find_for_student(&student.id) {
        Ok(Some(record)) => record,
        Ok(None) => {
            println!("  Screening store returned no record");
            return Ok(());
        }
        Err(err) => {
            println!("  Screening store unavailable: {}", err);
            return Ok(());
        }
    };

    match serde_json::to_string_pretty(&record) {
        Ok(json) => println!("\nMerged record:\n{}", json),
        Err(err) => println!("\nMerged record unavailable: {}", err),
    }
    println!(
        "Completed screenings: {}",
        describe(&calculate_completion_status(Some(&record)))
    );

    Ok(())
}

fn describe(flags: &RequirementSet) -> String {
    let labels: Vec<&str> = flags.enabled().map(TestKind::label).collect();
    if labels.is_empty() {
        "none".to_string()
    } else {
        labels.join(", ")
    }
}

fn demo_student() -> StudentRecord {
    StudentRecord {
        id: StudentId("stu-demo".to_string()),
        unique_id: ExternalStudentId("ST0001".to_string()),
        first_name: "Maya".to_string(),
        last_name: "Hernandez".to_string(),
        grade: "7th".to_string(),
        gender: Gender::Female,
        school: "Lincoln Middle".to_string(),
        teacher: Some("Ms. Rivera".to_string()),
        dob: NaiveDate::from_ymd_opt(2013, 4, 9),
        status: EnrollmentStatus::Returning,
    }
}

fn vision_visit(student: &StudentRecord, today: NaiveDate) -> ScreeningSubmission {
    ScreeningSubmission {
        unique_id: Some(student.unique_id.0.clone()),
        screening_date: Some(today),
        screening_type: Some(ScreeningType::Initial),
        notes: Some("Referred for glasses check".to_string()),
        student: DemographicSnapshot {
            student_first_name: Some(student.first_name.clone()),
            student_last_name: Some(student.last_name.clone()),
            student_grade: Some(student.grade.clone()),
            student_gender: Some(student.gender.label().to_string()),
            student_status: Some(student.status.label().to_string()),
            student_dob: student.dob,
            ..DemographicSnapshot::default()
        },
        vision: Some(PhasePair {
            initial: Some(VisionReading {
                screener: Some("Nurse Joy".to_string()),
                date: Some(today),
                result: Some("pass".to_string()),
                ..VisionReading::default()
            }),
            rescreen: None,
        }),
        ..ScreeningSubmission::default()
    }
}

fn hearing_visit(student: &StudentRecord, today: NaiveDate) -> ScreeningSubmission {
    ScreeningSubmission {
        unique_id: Some(student.unique_id.0.clone()),
        screening_date: Some(today),
        screening_type: Some(ScreeningType::Rescreen),
        notes: Some("Passed on rescreen".to_string()),
        hearing: Some(PhasePair {
            initial: None,
            rescreen: Some(HearingReading {
                screener: Some("Nurse Joy".to_string()),
                date: Some(today),
                result: Some("pass".to_string()),
                ..HearingReading::default()
            }),
        }),
        ..ScreeningSubmission::default()
    }
}
