mod criteria;
mod rules;

pub use criteria::SelectionCriteria;

use serde::{Deserialize, Serialize};

use super::domain::Student;
use rules::unmet_criteria;

/// Tri-state answer to "may this student apply under these criteria?".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "detail", rename_all = "snake_case")]
pub enum Verdict {
    Eligible,
    Ineligible(Vec<IneligibilityReason>),
    /// Prerequisite data is missing, so the criteria cannot be judged yet.
    Indeterminate(MissingPrerequisite),
}

impl Verdict {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Verdict::Eligible)
    }

    pub fn summary(&self) -> String {
        match self {
            Verdict::Eligible => "eligible".to_string(),
            Verdict::Ineligible(reasons) => {
                let details: Vec<String> = reasons.iter().map(|reason| reason.summary()).collect();
                format!("not eligible: {}", details.join("; "))
            }
            Verdict::Indeterminate(missing) => missing.message(),
        }
    }
}

/// What the student still has to provide, in the order it is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPrerequisite {
    QualificationsForm,
    QualificationsVerification,
    ProfileVerification,
}

impl MissingPrerequisite {
    pub fn message(self) -> String {
        match self {
            MissingPrerequisite::QualificationsForm => {
                "You need to fill the qualifications form before applying.".to_string()
            }
            MissingPrerequisite::QualificationsVerification => {
                "Please get your qualifications verified by the placement cell faculty first."
                    .to_string()
            }
            MissingPrerequisite::ProfileVerification => {
                "Please get your profile verified by the placement cell faculty first.".to_string()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum IneligibilityReason {
    TenthBelowMinimum { required: f32, actual: f32 },
    TwelfthBelowMinimum { required: f32, actual: f32 },
    GraduationBelowMinimum { required: f32, actual: Option<f32> },
    TooManyBacklogs { allowed: u8, actual: u8 },
    YearNotEligible { year: u8 },
}

impl IneligibilityReason {
    pub fn summary(&self) -> String {
        match self {
            IneligibilityReason::TenthBelowMinimum { required, actual } => {
                format!("10th percentage {actual:.2} below required {required:.2}")
            }
            IneligibilityReason::TwelfthBelowMinimum { required, actual } => {
                format!("12th percentage {actual:.2} below required {required:.2}")
            }
            IneligibilityReason::GraduationBelowMinimum { required, actual } => match actual {
                Some(actual) => {
                    format!("graduation percentage {actual:.2} below required {required:.2}")
                }
                None => format!("graduation percentage missing (required {required:.2})"),
            },
            IneligibilityReason::TooManyBacklogs { allowed, actual } => {
                format!("{actual} active backlog(s), at most {allowed} allowed")
            }
            IneligibilityReason::YearNotEligible { year } => {
                format!("year {year} students are not eligible")
            }
        }
    }
}

/// Judge a student against a session's criteria. Pure; reads nothing but its inputs.
pub fn evaluate(student: &Student, criteria: &SelectionCriteria) -> Verdict {
    let Some(qualifications) = &student.qualifications else {
        return Verdict::Indeterminate(MissingPrerequisite::QualificationsForm);
    };

    if !qualifications.verification.is_verified() {
        return Verdict::Indeterminate(MissingPrerequisite::QualificationsVerification);
    }

    if !student.verification.is_verified() {
        return Verdict::Indeterminate(MissingPrerequisite::ProfileVerification);
    }

    let reasons = unmet_criteria(qualifications, student.current_year, criteria);
    if reasons.is_empty() {
        Verdict::Eligible
    } else {
        Verdict::Ineligible(reasons)
    }
}
