//! Storage-agnostic filter over placement and dummy sessions.
//!
//! A `SessionQuery` is a conjunction of `SessionPredicate`s. The in-memory store evaluates it
//! directly through [`SessionAttributes`]; the SQLite store compiles the same tree to a `WHERE`
//! clause.

use chrono::NaiveDate;

use super::domain::{CollegeId, PlacementType, SessionRef, StreamId, StudentId};

/// Read-only view shared by real and practice sessions so one predicate tree filters both.
pub trait SessionAttributes {
    fn session_ref(&self) -> SessionRef;
    fn college(&self) -> CollegeId;
    fn covers_stream(&self, stream: StreamId) -> bool;
    fn salary(&self) -> u32;
    fn placement_type(&self) -> PlacementType;
    fn application_deadline(&self) -> NaiveDate;
    fn ended(&self) -> bool;
    /// Practice sessions need no approval and always report `true`.
    fn approved(&self) -> bool;
    fn has_enrolled(&self, student: StudentId) -> bool;
    fn has_applicant(&self, student: StudentId) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionPredicate {
    College(CollegeId),
    CoversStream(StreamId),
    SalaryAtMost(u32),
    Approved,
    OfType(PlacementType),
    DeadlineOnOrAfter(NaiveDate),
    Ended,
    EnrolledBy(StudentId),
    AppliedBy(StudentId),
    Not(Box<SessionPredicate>),
    Any(Vec<SessionPredicate>),
    All(Vec<SessionPredicate>),
}

impl SessionPredicate {
    pub fn deadline_before(date: NaiveDate) -> Self {
        SessionPredicate::DeadlineOnOrAfter(date).negate()
    }

    pub fn negate(self) -> Self {
        match self {
            SessionPredicate::Not(inner) => *inner,
            other => SessionPredicate::Not(Box::new(other)),
        }
    }

    pub fn matches<S>(&self, session: &S) -> bool
    where
        S: SessionAttributes + ?Sized,
    {
        match self {
            SessionPredicate::College(college) => session.college() == *college,
            SessionPredicate::CoversStream(stream) => session.covers_stream(*stream),
            SessionPredicate::SalaryAtMost(limit) => session.salary() <= *limit,
            SessionPredicate::Approved => session.approved(),
            SessionPredicate::OfType(kind) => session.placement_type() == *kind,
            SessionPredicate::DeadlineOnOrAfter(date) => session.application_deadline() >= *date,
            SessionPredicate::Ended => session.ended(),
            SessionPredicate::EnrolledBy(student) => session.has_enrolled(*student),
            SessionPredicate::AppliedBy(student) => session.has_applicant(*student),
            SessionPredicate::Not(inner) => !inner.matches(session),
            SessionPredicate::Any(options) => options.iter().any(|option| option.matches(session)),
            SessionPredicate::All(parts) => parts.iter().all(|part| part.matches(session)),
        }
    }
}

/// Conjunction of predicates handed to a [`PlacementStore`](super::repository::PlacementStore).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionQuery {
    predicates: Vec<SessionPredicate>,
}

impl SessionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: SessionPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn predicates(&self) -> &[SessionPredicate] {
        &self.predicates
    }

    pub fn matches<S>(&self, session: &S) -> bool
    where
        S: SessionAttributes + ?Sized,
    {
        self.predicates
            .iter()
            .all(|predicate| predicate.matches(session))
    }

    /// Sessions a student may see on the opportunities board.
    ///
    /// Same college and stream, salary within the student's expectation, and either still open
    /// or already joined. Withdrawn sessions vanish once closed or ended; joined sessions vanish
    /// only when both ended and past their deadline.
    pub fn visible_to(
        student: StudentId,
        college: CollegeId,
        stream: StreamId,
        salary_expected: u32,
        today: NaiveDate,
    ) -> Self {
        use SessionPredicate::*;

        let closed = SessionPredicate::deadline_before(today);
        let withdrawn_and_closed = All(vec![
            AppliedBy(student),
            EnrolledBy(student).negate(),
            Any(vec![closed.clone(), Ended]),
        ]);
        let enrolled_and_finished = All(vec![EnrolledBy(student), Ended, closed]);

        SessionQuery::new()
            .filter(College(college))
            .filter(CoversStream(stream))
            .filter(Approved)
            .filter(SalaryAtMost(salary_expected))
            .filter(Any(vec![DeadlineOnOrAfter(today), EnrolledBy(student)]))
            .filter(withdrawn_and_closed.negate())
            .filter(enrolled_and_finished.negate())
    }
}
