//! Recipient identities and the 5-digit student-id encoding.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A student as submitted by the attendance front end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudentRef {
    #[serde(rename = "studentId")]
    pub student_id: String,
    pub name: String,
}

/// Decoded form of a 5-digit student id.
///
/// The encoding is positional: first digit is the grade, first three digits
/// together form the class code as displayed in the portal address book
/// (e.g. `108반`), and the last two digits are the roll number within that
/// class. `"10823"` → grade 1, class `"108"`, roll 23.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentId {
    pub grade: u8,
    pub class_code: String,
    pub roll_number: u8,
}

impl StudentId {
    pub fn parse(raw: &str) -> Result<Self, StudentIdError> {
        let digits = raw.trim();
        if digits.len() != 5 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(StudentIdError(raw.to_string()));
        }
        let grade = digits[..1]
            .parse()
            .map_err(|_| StudentIdError(raw.to_string()))?;
        let roll_number = digits[3..]
            .parse()
            .map_err(|_| StudentIdError(raw.to_string()))?;
        Ok(Self {
            grade,
            class_code: digits[..3].to_string(),
            roll_number,
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid student id '{0}': expected exactly five digits")]
pub struct StudentIdError(String);

/// A target of one dispatched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientSpec {
    /// Matched by text search inside the staff subtree of the address book.
    Staff { display_name: String },
    /// Located by grade/class/roll derived from the student id.
    Student(StudentRef),
}

impl RecipientSpec {
    /// Short human-readable identity for logs and results.
    pub fn label(&self) -> &str {
        match self {
            RecipientSpec::Staff { display_name } => display_name,
            RecipientSpec::Student(student) => &student.name,
        }
    }
}

impl fmt::Display for RecipientSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipientSpec::Staff { display_name } => write!(f, "{display_name} (staff)"),
            RecipientSpec::Student(student) => {
                write!(f, "{} ({})", student.name, student.student_id)
            }
        }
    }
}

/// Which relationship(s) receive the notification for a student.
///
/// Determines which checkbox labels are toggled in the recipient-type region
/// of the compose form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecipientType {
    #[default]
    StudentAndParent,
    ParentOnly,
    StudentOnly,
}

impl RecipientType {
    pub const VALID: &[&str] = &["student_and_parent", "parent_only", "student_only"];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientType::StudentAndParent => "student_and_parent",
            RecipientType::ParentOnly => "parent_only",
            RecipientType::StudentOnly => "student_only",
        }
    }

    /// Checkbox label substrings to toggle in the recipient-type container.
    pub fn checkbox_labels(&self) -> &'static [&'static str] {
        match self {
            RecipientType::StudentAndParent => &["학생(본인)", "어머니"],
            RecipientType::ParentOnly => &["어머니"],
            RecipientType::StudentOnly => &["학생(본인)"],
        }
    }
}

impl fmt::Display for RecipientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecipientType {
    type Err = InvalidRecipientType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student_and_parent" => Ok(RecipientType::StudentAndParent),
            "parent_only" => Ok(RecipientType::ParentOnly),
            "student_only" => Ok(RecipientType::StudentOnly),
            other => Err(InvalidRecipientType(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid recipientType '{0}' (valid: student_and_parent, parent_only, student_only)")]
pub struct InvalidRecipientType(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_grade_class_and_roll() {
        let id = StudentId::parse("10823").unwrap();
        assert_eq!(id.grade, 1);
        assert_eq!(id.class_code, "108");
        assert_eq!(id.roll_number, 23);
    }

    #[test]
    fn parses_second_grade_ids() {
        let id = StudentId::parse("21105").unwrap();
        assert_eq!(id.grade, 2);
        assert_eq!(id.class_code, "211");
        assert_eq!(id.roll_number, 5);
    }

    #[test]
    fn rejects_short_long_and_non_numeric_ids() {
        assert!(StudentId::parse("1082").is_err());
        assert!(StudentId::parse("108233").is_err());
        assert!(StudentId::parse("1o823").is_err());
        assert!(StudentId::parse("").is_err());
    }

    #[test]
    fn recipient_type_round_trips_and_rejects_unknown() {
        for raw in RecipientType::VALID {
            assert_eq!(raw.parse::<RecipientType>().unwrap().as_str(), *raw);
        }
        assert!("everyone".parse::<RecipientType>().is_err());
    }

    #[test]
    fn recipient_type_selects_expected_labels() {
        assert_eq!(
            RecipientType::StudentAndParent.checkbox_labels(),
            &["학생(본인)", "어머니"]
        );
        assert_eq!(RecipientType::ParentOnly.checkbox_labels(), &["어머니"]);
        assert_eq!(RecipientType::StudentOnly.checkbox_labels(), &["학생(본인)"]);
    }
}
