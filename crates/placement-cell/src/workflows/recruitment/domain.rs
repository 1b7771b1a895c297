use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::eligibility::SelectionCriteria;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Primary key of a student profile.
    StudentId
);
record_id!(CollegeId);
record_id!(StreamId);
record_id!(ProgrammeId);
record_id!(CompanyId);
record_id!(AssociationId);
record_id!(
    /// Primary key of a real recruitment round.
    SessionId
);
record_id!(DummyCompanyId);
record_id!(
    /// Primary key of a practice-only recruitment round.
    DummySessionId
);
record_id!(FacultyId);

/// Job or internship, the two recruitment categories listed separately to students.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementType {
    Job,
    Internship,
}

impl PlacementType {
    pub const fn label(self) -> &'static str {
        match self {
            PlacementType::Job => "job",
            PlacementType::Internship => "internship",
        }
    }

    pub const fn code(self) -> &'static str {
        match self {
            PlacementType::Job => "J",
            PlacementType::Internship => "I",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "J" => Some(PlacementType::Job),
            "I" => Some(PlacementType::Internship),
            _ => None,
        }
    }
}

/// Reference to either a real placement session or a practice one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SessionRef {
    Placement(SessionId),
    Dummy(DummySessionId),
}

impl SessionRef {
    pub const fn kind(self) -> SessionKind {
        match self {
            SessionRef::Placement(_) => SessionKind::Placement,
            SessionRef::Dummy(_) => SessionKind::Dummy,
        }
    }

    pub const fn raw_id(self) -> u64 {
        match self {
            SessionRef::Placement(id) => id.0,
            SessionRef::Dummy(id) => id.0,
        }
    }

    pub const fn from_parts(kind: SessionKind, id: u64) -> Self {
        match kind {
            SessionKind::Placement => SessionRef::Placement(SessionId(id)),
            SessionKind::Dummy => SessionRef::Dummy(DummySessionId(id)),
        }
    }
}

impl fmt::Display for SessionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind().label(), self.raw_id())
    }
}

/// Origin of a session; preserved on every listed opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Placement,
    Dummy,
}

impl SessionKind {
    pub const fn label(self) -> &'static str {
        match self {
            SessionKind::Placement => "placement",
            SessionKind::Dummy => "dummy",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "placement" => Some(SessionKind::Placement),
            "dummy" => Some(SessionKind::Dummy),
            _ => None,
        }
    }
}

/// Faculty attestation of a profile or qualifications record.
///
/// `verdict` is `Some(true)` once verified, `Some(false)` while awaiting (re)verification and
/// `None` when a verifier skipped the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub verdict: Option<bool>,
    pub verified_by: Option<FacultyId>,
}

impl Verification {
    pub const fn unverified() -> Self {
        Self {
            verdict: Some(false),
            verified_by: None,
        }
    }

    pub const fn verified_by(faculty: FacultyId) -> Self {
        Self {
            verdict: Some(true),
            verified_by: Some(faculty),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verdict == Some(true) && self.verified_by.is_some()
    }

    /// State after the owner edits the record: unverified, last verifier kept for follow-up.
    pub const fn reset(self) -> Self {
        Self {
            verdict: Some(false),
            verified_by: self.verified_by,
        }
    }
}

impl Default for Verification {
    fn default() -> Self {
        Self::unverified()
    }
}

/// Academic record checked against selection criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qualifications {
    pub tenth_percentage: f32,
    pub twelfth_percentage: f32,
    pub graduation_percentage: Option<f32>,
    pub active_backlogs: u8,
    pub verification: Verification,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub enrollment_no: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub college: CollegeId,
    pub stream: StreamId,
    pub programme: ProgrammeId,
    pub current_year: u8,
    /// Expected salary in lakhs per annum.
    pub salary_expected: Option<u32>,
    pub is_barred: bool,
    pub verification: Verification,
    pub qualifications: Option<Qualifications>,
    /// Sessions the student is currently enrolled in.
    pub sessions: BTreeSet<SessionRef>,
    /// Every session the student ever applied to; never shrinks.
    pub sessions_applied_to: BTreeSet<SessionRef>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_enrolled(&self, session: SessionRef) -> bool {
        self.sessions.contains(&session)
    }

    pub fn has_applied(&self, session: SessionRef) -> bool {
        self.sessions_applied_to.contains(&session)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct College {
    pub id: CollegeId,
    /// Three digit institution code embedded in enrollment numbers.
    pub code: String,
    pub name: String,
    pub streams: BTreeSet<StreamId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Programme {
    pub id: ProgrammeId,
    pub name: String,
    pub years: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    pub id: StreamId,
    pub code: String,
    pub name: String,
    pub programme: ProgrammeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacultyPermission {
    Verifier,
    StudentDeletion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faculty {
    pub id: FacultyId,
    pub username: String,
    pub college: CollegeId,
    pub permissions: BTreeSet<FacultyPermission>,
}

impl Faculty {
    pub fn can(&self, permission: FacultyPermission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// A company's recruitment offer at one college.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub id: AssociationId,
    pub company: CompanyId,
    pub college: CollegeId,
    pub placement_type: PlacementType,
    pub salary: u32,
    pub streams: BTreeSet<StreamId>,
    pub approved: bool,
    pub session: Option<SessionId>,
}

/// One concrete recruitment round under an association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementSession {
    pub id: SessionId,
    pub association: AssociationId,
    pub application_deadline: NaiveDate,
    pub selection_criteria: SelectionCriteria,
    pub ended: bool,
    pub students: BTreeSet<StudentId>,
    pub applicants: BTreeSet<StudentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DummyCompany {
    pub id: DummyCompanyId,
    pub name: String,
    pub college: CollegeId,
}

/// Practice-only round; never counted in placement statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DummySession {
    pub id: DummySessionId,
    pub dummy_company: DummyCompanyId,
    pub placement_type: PlacementType,
    pub salary: u32,
    pub streams: BTreeSet<StreamId>,
    pub application_deadline: NaiveDate,
    pub selection_criteria: SelectionCriteria,
    pub ended: bool,
    pub students: BTreeSet<StudentId>,
    pub applicants: BTreeSet<StudentId>,
}

/// Result of flipping a student's membership in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleOutcome {
    Enrolled,
    Withdrawn,
}

impl ToggleOutcome {
    pub const fn is_enrolled(self) -> bool {
        matches!(self, ToggleOutcome::Enrolled)
    }
}

/// Direction of a membership change, decided from the membership the caller checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Join,
    Leave,
}

impl MembershipChange {
    /// The change a toggle makes from the given membership.
    pub const fn toggling(enrolled: bool) -> Self {
        if enrolled {
            MembershipChange::Leave
        } else {
            MembershipChange::Join
        }
    }

    /// Whether the store must currently hold the membership for this change to apply.
    pub const fn expects_enrolled(self) -> bool {
        matches!(self, MembershipChange::Leave)
    }

    pub const fn outcome(self) -> ToggleOutcome {
        match self {
            MembershipChange::Join => ToggleOutcome::Enrolled,
            MembershipChange::Leave => ToggleOutcome::Withdrawn,
        }
    }
}
