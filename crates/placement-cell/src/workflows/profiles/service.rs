use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::enrollment_number::{EnrollmentNumber, EnrollmentNumberError};
use crate::workflows::recruitment::domain::{
    Faculty, FacultyId, FacultyPermission, ProgrammeId, Qualifications, SessionRef, Student,
    StudentId, Verification,
};
use crate::workflows::recruitment::repository::{PlacementStore, RepositoryError};

const PUBLIC_COMPANY_LIMIT: usize = 3;

/// Personal fields a student fills in on signup and may edit later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub current_year: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualificationsForm {
    pub tenth_percentage: f32,
    pub twelfth_percentage: f32,
    #[serde(default)]
    pub graduation_percentage: Option<f32>,
    #[serde(default)]
    pub active_backlogs: u8,
}

/// Profile data safe to show to anyone holding the student's link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicProfile {
    pub name: String,
    pub college: String,
    pub stream: String,
    pub current_year: u8,
    pub placement_sessions: usize,
    pub companies: Vec<String>,
    pub and_others: bool,
}

impl PublicProfile {
    /// `"Acme, Borealis and others"` style line for the profile card.
    pub fn company_line(&self) -> String {
        let mut line = self.companies.join(", ");
        if self.and_others {
            line.push_str(" and others");
        }
        line
    }
}

/// Student self-service and faculty moderation of student profiles.
pub struct ProfileService<S> {
    store: Arc<S>,
}

impl<S> ProfileService<S>
where
    S: PlacementStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Register a new, unverified profile. College and stream come from the enrollment number.
    pub fn create_profile(
        &self,
        enrollment_no: &str,
        details: ProfileDetails,
    ) -> Result<Student, ProfileError> {
        let number = EnrollmentNumber::parse(enrollment_no)?;

        let college = self
            .store
            .college_by_code(number.college_code())?
            .ok_or_else(|| ProfileError::UnknownCollege(number.college_code().to_string()))?;
        let stream = self
            .store
            .stream_by_code(number.stream_code())?
            .ok_or(ProfileError::UnknownStream)?;
        if !college.streams.contains(&stream.id) {
            return Err(ProfileError::StreamNotOffered {
                college: college.name,
                stream: stream.name,
            });
        }
        self.check_details(&details, stream.programme)?;

        if self.store.student_by_enrollment(number.as_str())?.is_some() {
            return Err(ProfileError::AlreadyRegistered);
        }

        let student = Student {
            id: StudentId(0),
            enrollment_no: number.to_string(),
            first_name: details.first_name,
            last_name: details.last_name,
            email: details.email,
            college: college.id,
            stream: stream.id,
            programme: stream.programme,
            current_year: details.current_year,
            salary_expected: None,
            is_barred: false,
            verification: Verification::unverified(),
            qualifications: None,
            sessions: BTreeSet::new(),
            sessions_applied_to: BTreeSet::new(),
        };

        let student = self.store.insert_student(student).map_err(|err| match err {
            RepositoryError::Conflict(_) => ProfileError::AlreadyRegistered,
            other => ProfileError::Store(other),
        })?;
        tracing::info!(
            target: "student",
            enrollment_no = %student.enrollment_no,
            college = %college.code,
            "profile created"
        );
        Ok(student)
    }

    /// Update personal fields. The profile goes back to awaiting verification.
    pub fn edit_profile(
        &self,
        student: StudentId,
        details: ProfileDetails,
    ) -> Result<Student, ProfileError> {
        let mut record = self.load_student(student)?;
        self.check_details(&details, record.programme)?;

        record.first_name = details.first_name;
        record.last_name = details.last_name;
        record.email = details.email;
        record.current_year = details.current_year;
        record.verification = record.verification.reset();
        self.store.update_student(&record)?;

        tracing::info!(
            target: "student",
            enrollment_no = %record.enrollment_no,
            "profile edited, awaiting verification"
        );
        Ok(record)
    }

    /// Create or replace the qualifications record; it goes back to awaiting verification.
    pub fn submit_qualifications(
        &self,
        student: StudentId,
        form: QualificationsForm,
    ) -> Result<Student, ProfileError> {
        check_form(&form)?;
        let mut record = self.load_student(student)?;

        let verification = match &record.qualifications {
            Some(existing) => existing.verification.reset(),
            None => Verification {
                verdict: Some(false),
                verified_by: record.verification.verified_by,
            },
        };
        record.qualifications = Some(Qualifications {
            tenth_percentage: form.tenth_percentage,
            twelfth_percentage: form.twelfth_percentage,
            graduation_percentage: form.graduation_percentage,
            active_backlogs: form.active_backlogs,
            verification,
        });
        self.store.update_student(&record)?;

        tracing::info!(
            target: "student",
            enrollment_no = %record.enrollment_no,
            "qualifications submitted"
        );
        Ok(record)
    }

    /// Record the expected salary in lakhs per annum.
    pub fn set_paygrade(&self, student: StudentId, lpa: u32) -> Result<Student, ProfileError> {
        if lpa == 0 {
            return Err(ProfileError::InvalidPaygrade);
        }
        let mut record = self.load_student(student)?;
        if record.salary_expected == Some(lpa) {
            return Ok(record);
        }

        record.salary_expected = Some(lpa);
        self.store.update_student(&record)?;
        tracing::info!(
            target: "student",
            enrollment_no = %record.enrollment_no,
            "Paygrade - {lpa} LPA"
        );
        Ok(record)
    }

    /// Verify (`Some(true)`), reject (`Some(false)`) or skip (`None`) a profile.
    pub fn verify_profile(
        &self,
        faculty: FacultyId,
        student: StudentId,
        verdict: Option<bool>,
    ) -> Result<Student, ProfileError> {
        let faculty = self.load_faculty(faculty, FacultyPermission::Verifier)?;
        let mut record = self.load_student(student)?;
        ensure_same_college(&faculty, &record)?;

        record.verification = Verification {
            verdict,
            verified_by: Some(faculty.id),
        };
        self.store.update_student(&record)?;

        log_verification(&faculty, &record, "profile", verdict);
        Ok(record)
    }

    /// Same as [`Self::verify_profile`] for the qualifications record.
    pub fn verify_qualifications(
        &self,
        faculty: FacultyId,
        student: StudentId,
        verdict: Option<bool>,
    ) -> Result<Student, ProfileError> {
        let faculty = self.load_faculty(faculty, FacultyPermission::Verifier)?;
        let mut record = self.load_student(student)?;
        ensure_same_college(&faculty, &record)?;

        let Some(qualifications) = record.qualifications.as_mut() else {
            return Err(ProfileError::QualificationsMissing);
        };
        qualifications.verification = Verification {
            verdict,
            verified_by: Some(faculty.id),
        };
        self.store.update_student(&record)?;

        log_verification(&faculty, &record, "qualifications", verdict);
        Ok(record)
    }

    pub fn set_barred(
        &self,
        faculty: FacultyId,
        student: StudentId,
        barred: bool,
    ) -> Result<Student, ProfileError> {
        let faculty = self.load_faculty(faculty, FacultyPermission::Verifier)?;
        let mut record = self.load_student(student)?;
        ensure_same_college(&faculty, &record)?;

        if record.is_barred != barred {
            record.is_barred = barred;
            self.store.update_student(&record)?;
            tracing::info!(
                target: "faculty",
                faculty = %faculty.username,
                enrollment_no = %record.enrollment_no,
                barred,
                "placement access changed"
            );
        }
        Ok(record)
    }

    /// Remove a student and every session membership they hold.
    pub fn delete_student(
        &self,
        faculty: FacultyId,
        student: StudentId,
        reason: Option<&str>,
    ) -> Result<(), ProfileError> {
        let faculty = self.load_faculty(faculty, FacultyPermission::StudentDeletion)?;
        let record = self.load_student(student)?;
        ensure_same_college(&faculty, &record)?;

        if !self.store.delete_student(record.id)? {
            return Err(ProfileError::UnknownStudent);
        }

        let reason = reason
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .unwrap_or("No reasons given");
        tracing::info!(
            target: "faculty",
            college = %faculty.college,
            faculty = %faculty.username,
            enrollment_no = %record.enrollment_no,
            reason,
            "deleted student"
        );
        Ok(())
    }

    /// Name, college, and a glimpse of the companies the student is enrolled with.
    ///
    /// Only real placement sessions count; practice rounds stay private.
    pub fn public_summary(&self, student: StudentId) -> Result<PublicProfile, ProfileError> {
        let record = self.load_student(student)?;
        let college = self
            .store
            .college(record.college)?
            .ok_or_else(|| integrity(format!("college {} of student", record.college)))?;
        let stream = self
            .store
            .stream(record.stream)?
            .ok_or_else(|| integrity(format!("stream {} of student", record.stream)))?;

        let placements: Vec<_> = record
            .sessions
            .iter()
            .filter_map(|session| match session {
                SessionRef::Placement(id) => Some(*id),
                SessionRef::Dummy(_) => None,
            })
            .collect();

        let mut companies = Vec::with_capacity(PUBLIC_COMPANY_LIMIT);
        for id in placements.iter().take(PUBLIC_COMPANY_LIMIT) {
            if let Some(listing) = self.store.placement_session(*id)? {
                companies.push(listing.company.name);
            }
        }

        Ok(PublicProfile {
            name: record.full_name(),
            college: college.name,
            stream: stream.name,
            current_year: record.current_year,
            placement_sessions: placements.len(),
            companies,
            and_others: placements.len() > PUBLIC_COMPANY_LIMIT,
        })
    }

    fn check_details(
        &self,
        details: &ProfileDetails,
        programme: ProgrammeId,
    ) -> Result<(), ProfileError> {
        if details.first_name.trim().is_empty() {
            return Err(ProfileError::MissingName);
        }
        let programme = self
            .store
            .programme(programme)?
            .ok_or_else(|| integrity(format!("programme {programme}")))?;
        if details.current_year == 0 || details.current_year > programme.years {
            return Err(ProfileError::InvalidYear {
                year: details.current_year,
                years: programme.years,
            });
        }
        Ok(())
    }

    fn load_student(&self, id: StudentId) -> Result<Student, ProfileError> {
        self.store.student(id)?.ok_or(ProfileError::UnknownStudent)
    }

    fn load_faculty(
        &self,
        id: FacultyId,
        permission: FacultyPermission,
    ) -> Result<Faculty, ProfileError> {
        let faculty = self.store.faculty(id)?.ok_or(ProfileError::UnknownFaculty)?;
        if !faculty.can(permission) {
            tracing::warn!(
                target: "faculty",
                faculty = %faculty.username,
                ?permission,
                "permission denied"
            );
            return Err(ProfileError::PermissionDenied);
        }
        Ok(faculty)
    }
}

fn ensure_same_college(faculty: &Faculty, student: &Student) -> Result<(), ProfileError> {
    if faculty.college == student.college {
        Ok(())
    } else {
        Err(ProfileError::CollegeMismatch)
    }
}

fn check_form(form: &QualificationsForm) -> Result<(), ProfileError> {
    let fields = [
        ("tenth_percentage", Some(form.tenth_percentage)),
        ("twelfth_percentage", Some(form.twelfth_percentage)),
        ("graduation_percentage", form.graduation_percentage),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            if !(0.0..=100.0).contains(&value) {
                return Err(ProfileError::InvalidPercentage { field });
            }
        }
    }
    Ok(())
}

fn log_verification(faculty: &Faculty, student: &Student, record: &str, verdict: Option<bool>) {
    let action = match verdict {
        Some(true) => "verified",
        Some(false) => "rejected",
        None => "skipped",
    };
    tracing::info!(
        target: "faculty",
        faculty = %faculty.username,
        enrollment_no = %student.enrollment_no,
        record,
        "{action}"
    );
}

fn integrity(detail: String) -> ProfileError {
    ProfileError::Store(RepositoryError::Integrity(detail))
}

/// Error raised by the profile workflow.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error(transparent)]
    InvalidEnrollment(#[from] EnrollmentNumberError),
    #[error("Institution with code {0} does not exist")]
    UnknownCollege(String),
    #[error("Incorrect programme code")]
    UnknownStream,
    #[error("{college} does not offer {stream}")]
    StreamNotOffered { college: String, stream: String },
    #[error("A profile with this enrollment number already exists")]
    AlreadyRegistered,
    #[error("First name is required")]
    MissingName,
    #[error("Year {year} is outside the programme's {years} years")]
    InvalidYear { year: u8, years: u8 },
    #[error("{field} must be between 0 and 100")]
    InvalidPercentage { field: &'static str },
    #[error("Paygrade must be a positive number of lakhs")]
    InvalidPaygrade,
    #[error("Student profile not found.")]
    UnknownStudent,
    #[error("The student has not filled the qualifications form.")]
    QualificationsMissing,
    #[error("Faculty account not found.")]
    UnknownFaculty,
    #[error("You are not authorized to perform this action.")]
    PermissionDenied,
    #[error("You cannot make this request.")]
    CollegeMismatch,
    #[error(transparent)]
    Store(#[from] RepositoryError),
}
