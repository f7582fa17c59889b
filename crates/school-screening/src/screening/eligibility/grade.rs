/// Grade label classified for rule matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeLevel {
    PreKThree,
    PreKFour,
    Kindergarten,
    /// 1st through 12th.
    Ordinal(u8),
    Unrecognized,
}

const ORDINALS: [&str; 12] = [
    "1st", "2nd", "3rd", "4th", "5th", "6th", "7th", "8th", "9th", "10th", "11th", "12th",
];

impl GradeLevel {
    pub fn parse(label: &str) -> Self {
        let normalized = label.trim().to_lowercase();

        if normalized.contains("pre-k (3)") || normalized == "pk3" {
            return Self::PreKThree;
        }
        if normalized.contains("pre-k (4)") || normalized == "pk4" {
            return Self::PreKFour;
        }
        if normalized.contains("kindergarten") || normalized == "k" {
            return Self::Kindergarten;
        }

        ORDINALS
            .iter()
            .position(|ordinal| *ordinal == normalized)
            .map(|index| Self::Ordinal(index as u8 + 1))
            .unwrap_or(Self::Unrecognized)
    }

    /// Kindergarten through 12th.
    pub const fn is_school_age(self) -> bool {
        matches!(self, Self::Kindergarten | Self::Ordinal(_))
    }

    pub const fn ordinal(self) -> Option<u8> {
        match self {
            Self::Ordinal(grade) => Some(grade),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_case_insensitively() {
        assert_eq!(GradeLevel::parse("Pre-K (3)"), GradeLevel::PreKThree);
        assert_eq!(GradeLevel::parse(" PK4 "), GradeLevel::PreKFour);
        assert_eq!(GradeLevel::parse("K"), GradeLevel::Kindergarten);
        assert_eq!(GradeLevel::parse("Kindergarten"), GradeLevel::Kindergarten);
        assert_eq!(GradeLevel::parse("5TH"), GradeLevel::Ordinal(5));
        assert_eq!(GradeLevel::parse("12th"), GradeLevel::Ordinal(12));
    }

    #[test]
    fn unknown_labels_are_unrecognized() {
        assert_eq!(GradeLevel::parse("Unknown"), GradeLevel::Unrecognized);
        assert_eq!(GradeLevel::parse("13th"), GradeLevel::Unrecognized);
        assert_eq!(GradeLevel::parse("5"), GradeLevel::Unrecognized);
        assert_eq!(GradeLevel::parse(""), GradeLevel::Unrecognized);
    }
}
