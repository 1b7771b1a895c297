//! Job and internship recruitment: eligibility, the opportunities board, and enrollment.
//!
//! Students see sessions from their own college and stream whose salary fits their stated
//! expectation, and toggle their membership in them. Real placement sessions and practice
//! (dummy) sessions share one listing and one toggle path; the store abstraction decides how
//! membership flips are made atomic.

pub mod codec;
pub mod domain;
pub mod eligibility;
pub mod listing;
pub mod notify;
pub mod query;
pub mod repository;
pub mod roster;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use codec::{CodecError, SessionCodec, SessionTokens};
pub use domain::{
    Association, AssociationId, College, CollegeId, Company, CompanyId, DummyCompany,
    DummyCompanyId, DummySession, DummySessionId, Faculty, FacultyId, FacultyPermission,
    MembershipChange, PlacementSession, PlacementType, Programme, ProgrammeId, Qualifications,
    SessionId, SessionKind, SessionRef, Stream, StreamId, Student, StudentId, ToggleOutcome,
    Verification,
};
pub use eligibility::{
    evaluate, IneligibilityReason, MissingPrerequisite, SelectionCriteria, Verdict,
};
pub use listing::{ListingOutcome, Opportunity, OpportunityBoard, OpportunityPartition};
pub use notify::{QueuedNotificationDispatcher, RecordingDispatcher};
pub use query::{SessionPredicate, SessionQuery};
pub use repository::{
    CatalogStore, DispatchError, DummyListing, Notification, NotificationDispatcher,
    NotificationEvent, PlacementListing, PlacementStore, RepositoryError,
};
pub use roster::{RosterError, RosterRow, SessionRoster};
pub use router::placement_router;
pub use service::{EnrollmentError, EnrollmentService, RequestIssue};
pub use store::{InMemoryPlacementStore, SqlitePlacementStore};
