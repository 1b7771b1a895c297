use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use axum::response::Response;
use chrono::{Duration, Local, NaiveDate};
use serde_json::Value;

use crate::workflows::recruitment::domain::{
    Association, AssociationId, College, CollegeId, Company, CompanyId, DummyCompany,
    DummyCompanyId, DummySession, DummySessionId, Faculty, FacultyId, FacultyPermission,
    MembershipChange, PlacementSession, PlacementType, Programme, ProgrammeId, Qualifications,
    SessionId, SessionRef, Stream, StreamId, Student, StudentId, ToggleOutcome, Verification,
};
use crate::workflows::recruitment::eligibility::SelectionCriteria;
use crate::workflows::recruitment::listing::{ListingOutcome, OpportunityBoard};
use crate::workflows::recruitment::query::SessionQuery;
use crate::workflows::recruitment::repository::{
    CatalogStore, DispatchError, DummyListing, Notification, NotificationDispatcher,
    PlacementListing, PlacementStore, RepositoryError,
};
use crate::workflows::recruitment::{
    EnrollmentService, InMemoryPlacementStore, RecordingDispatcher, SessionTokens,
};

pub(super) const COLLEGE: CollegeId = CollegeId(1);
pub(super) const OTHER_COLLEGE: CollegeId = CollegeId(2);
pub(super) const STREAM: StreamId = StreamId(1);
pub(super) const OTHER_STREAM: StreamId = StreamId(2);
pub(super) const VERIFIER: FacultyId = FacultyId(1);

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 10).expect("valid date")
}

/// Router handlers read the wall clock, so routing fixtures are dated from it.
pub(super) fn wall_clock_today() -> NaiveDate {
    Local::now().date_naive()
}

pub(super) fn days_after(date: NaiveDate, days: i64) -> NaiveDate {
    date + Duration::days(days)
}

pub(super) fn tokens() -> SessionTokens {
    SessionTokens::new("placement-test-salt", "dummy-test-salt", 8).expect("tokens build")
}

pub(super) fn seed_catalog<S: CatalogStore>(store: &S) {
    store
        .insert_programme(Programme {
            id: ProgrammeId(1),
            name: "B.Tech".to_string(),
            years: 4,
        })
        .expect("programme");
    for (id, code, name) in [(1, "027", "Computer Science"), (2, "031", "Information Technology")] {
        store
            .insert_stream(Stream {
                id: StreamId(id),
                code: code.to_string(),
                name: name.to_string(),
                programme: ProgrammeId(1),
            })
            .expect("stream");
    }
    store
        .insert_college(College {
            id: COLLEGE,
            code: "164".to_string(),
            name: "Maharaja Agrasen Institute of Technology".to_string(),
            streams: BTreeSet::from([STREAM, OTHER_STREAM]),
        })
        .expect("college");
    store
        .insert_college(College {
            id: OTHER_COLLEGE,
            code: "150".to_string(),
            name: "Bharati Vidyapeeth College of Engineering".to_string(),
            streams: BTreeSet::from([STREAM]),
        })
        .expect("college");
    store
        .insert_faculty(Faculty {
            id: VERIFIER,
            username: "placement.officer".to_string(),
            college: COLLEGE,
            permissions: BTreeSet::from([
                FacultyPermission::Verifier,
                FacultyPermission::StudentDeletion,
            ]),
        })
        .expect("faculty");
    for (id, name) in [(1, "Acme Analytics"), (2, "Borealis Labs"), (3, "Cobalt Systems")] {
        store
            .insert_company(Company {
                id: CompanyId(id),
                name: name.to_string(),
            })
            .expect("company");
    }
}

/// Shape of a session fixture; `job` gives an approved, open job in the home college and stream.
#[derive(Clone)]
pub(super) struct SessionFixture {
    pub(super) college: CollegeId,
    pub(super) streams: Vec<StreamId>,
    pub(super) placement_type: PlacementType,
    pub(super) salary: u32,
    pub(super) deadline: NaiveDate,
    pub(super) criteria: SelectionCriteria,
    pub(super) approved: bool,
    pub(super) company: CompanyId,
}

impl SessionFixture {
    pub(super) fn job(deadline: NaiveDate) -> Self {
        Self {
            college: COLLEGE,
            streams: vec![STREAM],
            placement_type: PlacementType::Job,
            salary: 5,
            deadline,
            criteria: SelectionCriteria::open(),
            approved: true,
            company: CompanyId(1),
        }
    }

    pub(super) fn internship(deadline: NaiveDate) -> Self {
        Self {
            placement_type: PlacementType::Internship,
            ..Self::job(deadline)
        }
    }
}

pub(super) fn add_placement<S: CatalogStore>(
    store: &S,
    id: u64,
    fixture: &SessionFixture,
) -> SessionRef {
    store
        .insert_association(Association {
            id: AssociationId(id),
            company: fixture.company,
            college: fixture.college,
            placement_type: fixture.placement_type,
            salary: fixture.salary,
            streams: fixture.streams.iter().copied().collect(),
            approved: fixture.approved,
            session: None,
        })
        .expect("association");
    store
        .insert_placement_session(PlacementSession {
            id: SessionId(id),
            association: AssociationId(id),
            application_deadline: fixture.deadline,
            selection_criteria: fixture.criteria.clone(),
            ended: false,
            students: BTreeSet::new(),
            applicants: BTreeSet::new(),
        })
        .expect("placement session");
    SessionRef::Placement(SessionId(id))
}

pub(super) fn add_dummy<S: CatalogStore>(
    store: &S,
    id: u64,
    fixture: &SessionFixture,
) -> SessionRef {
    store
        .insert_dummy_company(DummyCompany {
            id: DummyCompanyId(id),
            name: format!("Practice Round {id}"),
            college: fixture.college,
        })
        .expect("dummy company");
    store
        .insert_dummy_session(DummySession {
            id: DummySessionId(id),
            dummy_company: DummyCompanyId(id),
            placement_type: fixture.placement_type,
            salary: fixture.salary,
            streams: fixture.streams.iter().copied().collect(),
            application_deadline: fixture.deadline,
            selection_criteria: fixture.criteria.clone(),
            ended: false,
            students: BTreeSet::new(),
            applicants: BTreeSet::new(),
        })
        .expect("dummy session");
    SessionRef::Dummy(DummySessionId(id))
}

pub(super) fn verified_qualifications() -> Qualifications {
    Qualifications {
        tenth_percentage: 88.0,
        twelfth_percentage: 79.5,
        graduation_percentage: Some(72.0),
        active_backlogs: 0,
        verification: Verification::verified_by(VERIFIER),
    }
}

/// Student S: home college and stream, 6 LPA expectation, fully verified.
pub(super) fn verified_student() -> Student {
    Student {
        id: StudentId(0),
        enrollment_no: "00116402720".to_string(),
        first_name: "Asha".to_string(),
        last_name: "Verma".to_string(),
        email: "asha.verma@example.edu".to_string(),
        college: COLLEGE,
        stream: STREAM,
        programme: ProgrammeId(1),
        current_year: 3,
        salary_expected: Some(6),
        is_barred: false,
        verification: Verification::verified_by(VERIFIER),
        qualifications: Some(verified_qualifications()),
        sessions: BTreeSet::new(),
        sessions_applied_to: BTreeSet::new(),
    }
}

pub(super) fn insert_student<S: PlacementStore>(store: &S, student: Student) -> StudentId {
    store.insert_student(student).expect("student").id
}

pub(super) type TestService = EnrollmentService<InMemoryPlacementStore, RecordingDispatcher>;

pub(super) fn build_service() -> (
    TestService,
    Arc<InMemoryPlacementStore>,
    Arc<RecordingDispatcher>,
) {
    let store = Arc::new(InMemoryPlacementStore::new());
    seed_catalog(store.as_ref());
    let notifier = Arc::new(RecordingDispatcher::new());
    let service = EnrollmentService::new(store.clone(), notifier.clone(), Arc::new(tokens()));
    (service, store, notifier)
}

pub(super) fn board(outcome: ListingOutcome) -> OpportunityBoard {
    match outcome {
        ListingOutcome::Opportunities(board) => board,
        other => panic!("expected opportunities, got {other:?}"),
    }
}

pub(super) fn enroll(service: &TestService, student: StudentId, session: SessionRef) {
    let outcome = service
        .toggle_application(student, session, today())
        .expect("toggle succeeds");
    assert_eq!(outcome, ToggleOutcome::Enrolled);
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) struct ClosedDispatcher;

impl NotificationDispatcher for ClosedDispatcher {
    fn dispatch(&self, _notification: Notification) -> Result<(), DispatchError> {
        Err(DispatchError::Closed)
    }
}

pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl PlacementStore for UnavailableStore {
    fn college(&self, _id: CollegeId) -> Result<Option<College>, RepositoryError> {
        offline()
    }
    fn college_by_code(&self, _code: &str) -> Result<Option<College>, RepositoryError> {
        offline()
    }
    fn stream(&self, _id: StreamId) -> Result<Option<Stream>, RepositoryError> {
        offline()
    }
    fn stream_by_code(&self, _code: &str) -> Result<Option<Stream>, RepositoryError> {
        offline()
    }
    fn programme(&self, _id: ProgrammeId) -> Result<Option<Programme>, RepositoryError> {
        offline()
    }
    fn faculty(&self, _id: FacultyId) -> Result<Option<Faculty>, RepositoryError> {
        offline()
    }
    fn student(&self, _id: StudentId) -> Result<Option<Student>, RepositoryError> {
        offline()
    }
    fn student_by_enrollment(&self, _no: &str) -> Result<Option<Student>, RepositoryError> {
        offline()
    }
    fn insert_student(&self, _student: Student) -> Result<Student, RepositoryError> {
        offline()
    }
    fn update_student(&self, _student: &Student) -> Result<(), RepositoryError> {
        offline()
    }
    fn delete_student(&self, _id: StudentId) -> Result<bool, RepositoryError> {
        offline()
    }
    fn placement_session(
        &self,
        _id: SessionId,
    ) -> Result<Option<PlacementListing>, RepositoryError> {
        offline()
    }
    fn dummy_session(&self, _id: DummySessionId) -> Result<Option<DummyListing>, RepositoryError> {
        offline()
    }
    fn query_placement_sessions(
        &self,
        _query: &SessionQuery,
    ) -> Result<Vec<PlacementListing>, RepositoryError> {
        offline()
    }
    fn query_dummy_sessions(
        &self,
        _query: &SessionQuery,
    ) -> Result<Vec<DummyListing>, RepositoryError> {
        offline()
    }
    fn change_membership(
        &self,
        _student: StudentId,
        _session: SessionRef,
        _change: MembershipChange,
    ) -> Result<ToggleOutcome, RepositoryError> {
        offline()
    }
}

/// In-memory store that, once armed, holds the next `writers` membership changes until all of
/// them arrive, so every racing request has read its snapshot before any of them writes.
pub(super) struct LockstepStore {
    inner: InMemoryPlacementStore,
    gate: Barrier,
    writers: usize,
    arrivals: AtomicUsize,
}

impl LockstepStore {
    pub(super) fn new(writers: usize) -> Self {
        let inner = InMemoryPlacementStore::new();
        seed_catalog(&inner);
        Self {
            inner,
            gate: Barrier::new(writers),
            writers,
            arrivals: AtomicUsize::new(writers),
        }
    }

    pub(super) fn arm(&self) {
        self.arrivals.store(0, Ordering::SeqCst);
    }
}

impl PlacementStore for LockstepStore {
    fn college(&self, id: CollegeId) -> Result<Option<College>, RepositoryError> {
        self.inner.college(id)
    }
    fn college_by_code(&self, code: &str) -> Result<Option<College>, RepositoryError> {
        self.inner.college_by_code(code)
    }
    fn stream(&self, id: StreamId) -> Result<Option<Stream>, RepositoryError> {
        self.inner.stream(id)
    }
    fn stream_by_code(&self, code: &str) -> Result<Option<Stream>, RepositoryError> {
        self.inner.stream_by_code(code)
    }
    fn programme(&self, id: ProgrammeId) -> Result<Option<Programme>, RepositoryError> {
        self.inner.programme(id)
    }
    fn faculty(&self, id: FacultyId) -> Result<Option<Faculty>, RepositoryError> {
        self.inner.faculty(id)
    }
    fn student(&self, id: StudentId) -> Result<Option<Student>, RepositoryError> {
        self.inner.student(id)
    }
    fn student_by_enrollment(&self, no: &str) -> Result<Option<Student>, RepositoryError> {
        self.inner.student_by_enrollment(no)
    }
    fn insert_student(&self, student: Student) -> Result<Student, RepositoryError> {
        self.inner.insert_student(student)
    }
    fn update_student(&self, student: &Student) -> Result<(), RepositoryError> {
        self.inner.update_student(student)
    }
    fn delete_student(&self, id: StudentId) -> Result<bool, RepositoryError> {
        self.inner.delete_student(id)
    }
    fn placement_session(
        &self,
        id: SessionId,
    ) -> Result<Option<PlacementListing>, RepositoryError> {
        self.inner.placement_session(id)
    }
    fn dummy_session(&self, id: DummySessionId) -> Result<Option<DummyListing>, RepositoryError> {
        self.inner.dummy_session(id)
    }
    fn query_placement_sessions(
        &self,
        query: &SessionQuery,
    ) -> Result<Vec<PlacementListing>, RepositoryError> {
        self.inner.query_placement_sessions(query)
    }
    fn query_dummy_sessions(
        &self,
        query: &SessionQuery,
    ) -> Result<Vec<DummyListing>, RepositoryError> {
        self.inner.query_dummy_sessions(query)
    }
    fn change_membership(
        &self,
        student: StudentId,
        session: SessionRef,
        change: MembershipChange,
    ) -> Result<ToggleOutcome, RepositoryError> {
        if self.arrivals.fetch_add(1, Ordering::SeqCst) < self.writers {
            self.gate.wait();
        }
        self.inner.change_membership(student, session, change)
    }
}

impl CatalogStore for LockstepStore {
    fn insert_college(&self, college: College) -> Result<(), RepositoryError> {
        self.inner.insert_college(college)
    }
    fn insert_programme(&self, programme: Programme) -> Result<(), RepositoryError> {
        self.inner.insert_programme(programme)
    }
    fn insert_stream(&self, stream: Stream) -> Result<(), RepositoryError> {
        self.inner.insert_stream(stream)
    }
    fn insert_company(&self, company: Company) -> Result<(), RepositoryError> {
        self.inner.insert_company(company)
    }
    fn insert_faculty(&self, faculty: Faculty) -> Result<(), RepositoryError> {
        self.inner.insert_faculty(faculty)
    }
    fn insert_association(&self, association: Association) -> Result<(), RepositoryError> {
        self.inner.insert_association(association)
    }
    fn insert_placement_session(&self, session: PlacementSession) -> Result<(), RepositoryError> {
        self.inner.insert_placement_session(session)
    }
    fn insert_dummy_company(&self, company: DummyCompany) -> Result<(), RepositoryError> {
        self.inner.insert_dummy_company(company)
    }
    fn insert_dummy_session(&self, session: DummySession) -> Result<(), RepositoryError> {
        self.inner.insert_dummy_session(session)
    }
    fn set_session_ended(&self, session: SessionRef, ended: bool) -> Result<(), RepositoryError> {
        self.inner.set_session_ended(session, ended)
    }
}
