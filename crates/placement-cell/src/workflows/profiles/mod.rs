//! Student profiles: signup from enrollment numbers, self-service edits, and faculty
//! verification. Any edit by the student sends the record back for verification, which the
//! recruitment workflow requires before applications are accepted.

pub mod enrollment_number;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use enrollment_number::{EnrollmentNumber, EnrollmentNumberError};
pub use router::profile_router;
pub use service::{ProfileDetails, ProfileError, ProfileService, PublicProfile, QualificationsForm};
