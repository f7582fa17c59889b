//! Which screenings a student owes, from grade, gender, enrollment status,
//! and date of birth.
//!
//! Pre-K grades short-circuit: nothing else applies to them. For every other
//! label the vision/hearing, acanthosis, and scoliosis rules are evaluated
//! independently.

mod grade;
mod rules;

pub use grade::GradeLevel;

use super::domain::{RequirementSet, StudentProfile};

pub fn calculate_requirements(profile: &StudentProfile) -> RequirementSet {
    let grade = GradeLevel::parse(&profile.grade);
    let mut requirements = RequirementSet::default();

    match grade {
        GradeLevel::PreKThree => return requirements,
        GradeLevel::PreKFour => {
            let screened = rules::pre_k_four_screened(profile.date_of_birth);
            requirements.vision = screened;
            requirements.hearing = screened;
            return requirements;
        }
        _ => {}
    }

    if grade.is_school_age() {
        requirements.vision = true;
        requirements.hearing = true;
    }

    requirements.acanthosis = rules::acanthosis_required(grade, profile.status);
    requirements.scoliosis = rules::scoliosis_required(grade, profile.gender, profile.status);

    requirements
}

impl StudentProfile {
    pub fn requirements(&self) -> RequirementSet {
        calculate_requirements(self)
    }
}
