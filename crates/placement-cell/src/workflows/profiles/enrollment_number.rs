use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const LENGTH: usize = 11;

/// University enrollment number, `RRRCCCSSSYY`: roll, institution code, stream code, batch year.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EnrollmentNumber(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrollmentNumberError {
    #[error("Enrollment number should contain only digits")]
    NonDigit { position: usize },
    #[error("Enrollment number should be 11 digits long")]
    Length { found: usize },
}

impl EnrollmentNumber {
    pub fn parse(input: &str) -> Result<Self, EnrollmentNumberError> {
        let trimmed = input.trim();
        if let Some(position) = trimmed.chars().position(|c| !c.is_ascii_digit()) {
            return Err(EnrollmentNumberError::NonDigit { position });
        }
        if trimmed.len() != LENGTH {
            return Err(EnrollmentNumberError::Length {
                found: trimmed.len(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn roll(&self) -> &str {
        &self.0[0..3]
    }

    pub fn college_code(&self) -> &str {
        &self.0[3..6]
    }

    pub fn stream_code(&self) -> &str {
        &self.0[6..9]
    }

    /// Two-digit year of admission.
    pub fn batch_year(&self) -> &str {
        &self.0[9..11]
    }
}

impl fmt::Display for EnrollmentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EnrollmentNumber {
    type Err = EnrollmentNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EnrollmentNumber {
    type Error = EnrollmentNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EnrollmentNumber> for String {
    fn from(value: EnrollmentNumber) -> Self {
        value.0
    }
}
