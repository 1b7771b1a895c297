use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use super::codec::{CodecError, SessionTokens};
use super::domain::{
    FacultyId, MembershipChange, PlacementType, SessionKind, SessionRef, Student, StudentId,
    ToggleOutcome,
};
use super::eligibility::{evaluate, IneligibilityReason, MissingPrerequisite, Verdict};
use super::listing::{build_board, ListingOutcome};
use super::query::SessionQuery;
use super::roster::{build_roster, SessionRoster};
use super::repository::{
    Notification, NotificationDispatcher, NotificationEvent, PlacementStore, RepositoryError,
    SessionTarget,
};

/// Toggles retried after losing a race before the conflict is reported.
const MEMBERSHIP_ATTEMPTS: usize = 3;

/// Service composing the store, eligibility rules, token codec, and notification hook.
pub struct EnrollmentService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    tokens: Arc<SessionTokens>,
}

impl<S, N> EnrollmentService<S, N>
where
    S: PlacementStore + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, tokens: Arc<SessionTokens>) -> Self {
        Self {
            store,
            notifier,
            tokens,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn tokens(&self) -> &SessionTokens {
        &self.tokens
    }

    /// Build the student's opportunities board as of `today`.
    pub fn list_opportunities(
        &self,
        student: StudentId,
        today: NaiveDate,
    ) -> Result<ListingOutcome, EnrollmentError> {
        let student = self.load_student(student)?;

        let Some(salary_expected) = student.salary_expected else {
            return Ok(ListingOutcome::PaygradeRequired);
        };
        if student.is_barred {
            return Ok(ListingOutcome::Barred);
        }

        let query = SessionQuery::visible_to(
            student.id,
            student.college,
            student.stream,
            salary_expected,
            today,
        );
        let placements = self.store.query_placement_sessions(&query)?;
        let dummies = self.store.query_dummy_sessions(&query)?;

        Ok(ListingOutcome::Opportunities(build_board(
            student.id,
            &placements,
            &dummies,
            &self.tokens,
        )))
    }

    /// Judge the student against one session's selection criteria without changing anything.
    pub fn evaluate(
        &self,
        student: StudentId,
        session: SessionRef,
    ) -> Result<Verdict, EnrollmentError> {
        let student = self.load_student(student)?;
        let target = self.load_target(session)?;
        Ok(evaluate(&student, &target.selection_criteria))
    }

    /// Join the session if not enrolled, otherwise withdraw from it.
    ///
    /// The direction is checked against a fresh read and handed to the store, which refuses it
    /// if another request changed the membership in between. The checks then rerun on the new
    /// state, so racing toggles behave as if they had arrived one after the other.
    pub fn toggle_application(
        &self,
        student: StudentId,
        session: SessionRef,
        today: NaiveDate,
    ) -> Result<ToggleOutcome, EnrollmentError> {
        for _ in 0..MEMBERSHIP_ATTEMPTS {
            let record = self.load_student(student)?;
            let target = self.load_target(session)?;
            let change = check_toggle(&record, &target, today)?;

            let outcome = match self.store.change_membership(record.id, session, change) {
                Ok(outcome) => outcome,
                Err(RepositoryError::Stale(detail)) => {
                    tracing::debug!(%detail, "membership changed during toggle, re-checking");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            if !outcome.is_enrolled() {
                tracing::info!(
                    target: "student",
                    enrollment_no = %record.enrollment_no,
                    session = %session,
                    company = %target.company_name,
                    placement_type = target.placement_type.code(),
                    "withdrew from session"
                );
            }
            self.notify(&record, &target, outcome);
            return Ok(outcome);
        }

        Err(EnrollmentError::Store(RepositoryError::Stale(format!(
            "student {student} in session {session} after {MEMBERSHIP_ATTEMPTS} attempts"
        ))))
    }

    /// Students currently enrolled in a session, for faculty of the session's college.
    pub fn session_roster(
        &self,
        faculty: FacultyId,
        session: SessionRef,
    ) -> Result<SessionRoster, EnrollmentError> {
        let faculty = self
            .store
            .faculty(faculty)?
            .ok_or(EnrollmentError::InvalidRequest(RequestIssue::UnknownFaculty))?;
        let target = self.load_target(session)?;
        if faculty.college != target.college {
            return Err(RequestIssue::CollegeMismatch.into());
        }

        let roster = build_roster(self.store.as_ref(), &target)?;
        tracing::info!(
            target: "faculty",
            faculty = %faculty.username,
            session = %session,
            students = roster.rows.len(),
            "session roster exported"
        );
        Ok(roster)
    }

    /// Decode a URL token into a session reference of the given kind.
    pub fn resolve_token(
        &self,
        kind: SessionKind,
        token: &str,
    ) -> Result<SessionRef, EnrollmentError> {
        self.tokens
            .decode(kind, token)
            .map_err(|err: CodecError| {
                tracing::debug!(kind = kind.label(), error = %err, "rejected session token");
                EnrollmentError::from(RequestIssue::MalformedToken)
            })
    }

    fn load_student(&self, id: StudentId) -> Result<Student, EnrollmentError> {
        self.store
            .student(id)?
            .ok_or(EnrollmentError::InvalidRequest(RequestIssue::UnknownStudent))
    }

    fn load_target(&self, session: SessionRef) -> Result<SessionTarget, EnrollmentError> {
        let target = match session {
            SessionRef::Placement(id) => {
                self.store.placement_session(id)?.map(SessionTarget::from)
            }
            SessionRef::Dummy(id) => self.store.dummy_session(id)?.map(SessionTarget::from),
        };
        target.ok_or(EnrollmentError::InvalidRequest(RequestIssue::UnknownSession))
    }

    fn notify(&self, student: &Student, target: &SessionTarget, outcome: ToggleOutcome) {
        let (event, message) = match outcome {
            ToggleOutcome::Enrolled => (
                NotificationEvent::Applied,
                format!(
                    "You have applied to {} ({}).",
                    target.company_name,
                    target.placement_type.label()
                ),
            ),
            ToggleOutcome::Withdrawn => (
                NotificationEvent::Withdrawn,
                format!(
                    "You have withdrawn from {} ({}).",
                    target.company_name,
                    target.placement_type.label()
                ),
            ),
        };

        let notification = Notification {
            student: student.id,
            enrollment_no: student.enrollment_no.clone(),
            session: target.reference,
            event,
            message,
        };

        if let Err(err) = self.notifier.dispatch(notification) {
            tracing::warn!(
                student = %student.id,
                session = %target.reference,
                error = %err,
                "notification dispatch failed"
            );
        }
    }
}

/// Decide which way a toggle goes and whether the student may make it.
fn check_toggle(
    student: &Student,
    target: &SessionTarget,
    today: NaiveDate,
) -> Result<MembershipChange, EnrollmentError> {
    if student.is_barred {
        return Err(EnrollmentError::Forbidden);
    }
    if target.college != student.college {
        return Err(RequestIssue::CollegeMismatch.into());
    }
    if !target.streams.contains(&student.stream) {
        return Err(RequestIssue::StreamMismatch.into());
    }

    let change = MembershipChange::toggling(student.is_enrolled(target.reference));
    if change == MembershipChange::Join {
        if target.application_deadline < today {
            return Err(RequestIssue::DeadlinePassed.into());
        }
        match student.salary_expected {
            Some(expected) if target.salary <= expected => {}
            _ => return Err(RequestIssue::SalaryMismatch.into()),
        }
    }

    match evaluate(student, &target.selection_criteria) {
        Verdict::Eligible => Ok(change),
        Verdict::Indeterminate(missing) => Err(EnrollmentError::PrerequisiteMissing(missing)),
        Verdict::Ineligible(reasons) => Err(EnrollmentError::NotEligible {
            placement_type: target.placement_type,
            reasons,
        }),
    }
}

/// Why a request was rejected before any rule was evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestIssue {
    UnknownStudent,
    UnknownFaculty,
    UnknownSession,
    MalformedToken,
    CollegeMismatch,
    StreamMismatch,
    DeadlinePassed,
    SalaryMismatch,
}

impl RequestIssue {
    pub fn message(self) -> &'static str {
        match self {
            RequestIssue::UnknownStudent => "Student profile not found.",
            RequestIssue::UnknownFaculty
            | RequestIssue::UnknownSession
            | RequestIssue::MalformedToken => "Invalid request",
            RequestIssue::CollegeMismatch
            | RequestIssue::StreamMismatch
            | RequestIssue::DeadlinePassed
            | RequestIssue::SalaryMismatch => "You cannot make this request.",
        }
    }
}

/// Error raised by the enrollment service.
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error("{}", .0.message())]
    PrerequisiteMissing(MissingPrerequisite),
    #[error("Sorry, you are not eligible for this {}.", .placement_type.label())]
    NotEligible {
        placement_type: PlacementType,
        reasons: Vec<IneligibilityReason>,
    },
    #[error("{}", .0.message())]
    InvalidRequest(RequestIssue),
    #[error("Sorry, you have been barred by your college from placements.")]
    Forbidden,
    #[error(transparent)]
    Store(RepositoryError),
}

impl From<RequestIssue> for EnrollmentError {
    fn from(issue: RequestIssue) -> Self {
        EnrollmentError::InvalidRequest(issue)
    }
}

impl From<RepositoryError> for EnrollmentError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(_) => {
                EnrollmentError::InvalidRequest(RequestIssue::UnknownSession)
            }
            other => EnrollmentError::Store(other),
        }
    }
}
