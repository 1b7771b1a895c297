use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    Association, College, CollegeId, Company, DummyCompany, DummySession, DummySessionId,
    Faculty, FacultyId, MembershipChange, PlacementSession, PlacementType, Programme,
    ProgrammeId, SessionId, SessionRef, Stream, StreamId, Student, StudentId, ToggleOutcome,
};
use super::eligibility::SelectionCriteria;
use super::query::{SessionAttributes, SessionQuery};

/// A real session joined with its association and company, as listed to students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementListing {
    pub session: PlacementSession,
    pub association: Association,
    pub company: Company,
}

/// A practice session joined with its dummy company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DummyListing {
    pub session: DummySession,
    pub company: DummyCompany,
}

impl SessionAttributes for PlacementListing {
    fn session_ref(&self) -> SessionRef {
        SessionRef::Placement(self.session.id)
    }
    fn college(&self) -> CollegeId {
        self.association.college
    }
    fn covers_stream(&self, stream: StreamId) -> bool {
        self.association.streams.contains(&stream)
    }
    fn salary(&self) -> u32 {
        self.association.salary
    }
    fn placement_type(&self) -> PlacementType {
        self.association.placement_type
    }
    fn application_deadline(&self) -> NaiveDate {
        self.session.application_deadline
    }
    fn ended(&self) -> bool {
        self.session.ended
    }
    fn approved(&self) -> bool {
        self.association.approved
    }
    fn has_enrolled(&self, student: StudentId) -> bool {
        self.session.students.contains(&student)
    }
    fn has_applicant(&self, student: StudentId) -> bool {
        self.session.applicants.contains(&student)
    }
}

impl SessionAttributes for DummyListing {
    fn session_ref(&self) -> SessionRef {
        SessionRef::Dummy(self.session.id)
    }
    fn college(&self) -> CollegeId {
        self.company.college
    }
    fn covers_stream(&self, stream: StreamId) -> bool {
        self.session.streams.contains(&stream)
    }
    fn salary(&self) -> u32 {
        self.session.salary
    }
    fn placement_type(&self) -> PlacementType {
        self.session.placement_type
    }
    fn application_deadline(&self) -> NaiveDate {
        self.session.application_deadline
    }
    fn ended(&self) -> bool {
        self.session.ended
    }
    fn approved(&self) -> bool {
        true
    }
    fn has_enrolled(&self, student: StudentId) -> bool {
        self.session.students.contains(&student)
    }
    fn has_applicant(&self, student: StudentId) -> bool {
        self.session.applicants.contains(&student)
    }
}

/// Session facts the enrollment toggler needs, whichever kind of session it is.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTarget {
    pub reference: SessionRef,
    pub college: CollegeId,
    pub streams: BTreeSet<StreamId>,
    pub placement_type: PlacementType,
    pub salary: u32,
    pub application_deadline: NaiveDate,
    pub selection_criteria: SelectionCriteria,
    pub company_name: String,
    pub students: BTreeSet<StudentId>,
}

impl From<PlacementListing> for SessionTarget {
    fn from(listing: PlacementListing) -> Self {
        Self {
            reference: SessionRef::Placement(listing.session.id),
            college: listing.association.college,
            streams: listing.association.streams,
            placement_type: listing.association.placement_type,
            salary: listing.association.salary,
            application_deadline: listing.session.application_deadline,
            selection_criteria: listing.session.selection_criteria,
            company_name: listing.company.name,
            students: listing.session.students,
        }
    }
}

impl From<DummyListing> for SessionTarget {
    fn from(listing: DummyListing) -> Self {
        Self {
            reference: SessionRef::Dummy(listing.session.id),
            college: listing.company.college,
            streams: listing.session.streams,
            placement_type: listing.session.placement_type,
            salary: listing.session.salary,
            application_deadline: listing.session.application_deadline,
            selection_criteria: listing.session.selection_criteria,
            company_name: listing.company.name,
            students: listing.session.students,
        }
    }
}

/// Storage abstraction consumed by the listing, enrollment, and profile workflows.
///
/// Session queries return rows ordered by application deadline, then id.
pub trait PlacementStore: Send + Sync {
    fn college(&self, id: CollegeId) -> Result<Option<College>, RepositoryError>;
    fn college_by_code(&self, code: &str) -> Result<Option<College>, RepositoryError>;
    fn stream(&self, id: StreamId) -> Result<Option<Stream>, RepositoryError>;
    fn stream_by_code(&self, code: &str) -> Result<Option<Stream>, RepositoryError>;
    fn programme(&self, id: ProgrammeId) -> Result<Option<Programme>, RepositoryError>;
    fn faculty(&self, id: FacultyId) -> Result<Option<Faculty>, RepositoryError>;

    fn student(&self, id: StudentId) -> Result<Option<Student>, RepositoryError>;
    fn student_by_enrollment(&self, enrollment_no: &str)
        -> Result<Option<Student>, RepositoryError>;
    /// Persist a new profile, assigning its id. Membership sets on the input are ignored.
    fn insert_student(&self, student: Student) -> Result<Student, RepositoryError>;
    /// Overwrite profile fields. Membership sets are owned by `change_membership` and untouched.
    fn update_student(&self, student: &Student) -> Result<(), RepositoryError>;
    /// Remove the profile and its memberships; `false` when nothing was stored.
    fn delete_student(&self, id: StudentId) -> Result<bool, RepositoryError>;

    fn placement_session(&self, id: SessionId)
        -> Result<Option<PlacementListing>, RepositoryError>;
    fn dummy_session(&self, id: DummySessionId) -> Result<Option<DummyListing>, RepositoryError>;
    fn query_placement_sessions(
        &self,
        query: &SessionQuery,
    ) -> Result<Vec<PlacementListing>, RepositoryError>;
    fn query_dummy_sessions(&self, query: &SessionQuery)
        -> Result<Vec<DummyListing>, RepositoryError>;

    /// Atomically apply a membership change the caller validated against its own read.
    ///
    /// Joining records the session in both the current and applied-to sets; leaving removes it
    /// from the current set only. Concurrent calls for one pair serialize. When the stored
    /// membership no longer allows the change, nothing is written and `Stale` is returned.
    fn change_membership(
        &self,
        student: StudentId,
        session: SessionRef,
        change: MembershipChange,
    ) -> Result<ToggleOutcome, RepositoryError>;
}

/// Write access to reference data, used by seeding and administration.
pub trait CatalogStore: PlacementStore {
    fn insert_college(&self, college: College) -> Result<(), RepositoryError>;
    fn insert_programme(&self, programme: Programme) -> Result<(), RepositoryError>;
    fn insert_stream(&self, stream: Stream) -> Result<(), RepositoryError>;
    fn insert_company(&self, company: Company) -> Result<(), RepositoryError>;
    fn insert_faculty(&self, faculty: Faculty) -> Result<(), RepositoryError>;
    fn insert_association(&self, association: Association) -> Result<(), RepositoryError>;
    /// Link a session to its association. Membership sets on the input are ignored.
    fn insert_placement_session(&self, session: PlacementSession) -> Result<(), RepositoryError>;
    fn insert_dummy_company(&self, company: DummyCompany) -> Result<(), RepositoryError>;
    /// Membership sets on the input are ignored.
    fn insert_dummy_session(&self, session: DummySession) -> Result<(), RepositoryError>;
    fn set_session_ended(&self, session: SessionRef, ended: bool) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("stored data is inconsistent: {0}")]
    Integrity(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("membership changed concurrently: {0}")]
    Stale(String),
}

/// Outbound notification hook (e-mail/SMS queue). Callers never wait on delivery.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, notification: Notification) -> Result<(), DispatchError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub student: StudentId,
    pub enrollment_no: String,
    pub session: SessionRef,
    pub event: NotificationEvent,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    Applied,
    Withdrawn,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("notification queue closed")]
    Closed,
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
