use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use super::super::domain::{
    Association, AssociationId, College, CollegeId, Company, CompanyId, DummyCompany,
    DummyCompanyId, DummySession, DummySessionId, Faculty, FacultyId, MembershipChange,
    PlacementSession, Programme, ProgrammeId, SessionId, SessionRef, Stream, StreamId, Student,
    StudentId, ToggleOutcome,
};
use super::super::query::SessionQuery;
use super::super::repository::{
    CatalogStore, DummyListing, PlacementListing, PlacementStore, RepositoryError,
};

#[derive(Default)]
struct StoreState {
    colleges: BTreeMap<CollegeId, College>,
    programmes: BTreeMap<ProgrammeId, Programme>,
    streams: BTreeMap<StreamId, Stream>,
    companies: BTreeMap<CompanyId, Company>,
    faculty: BTreeMap<FacultyId, Faculty>,
    students: BTreeMap<StudentId, Student>,
    next_student_id: u64,
    associations: BTreeMap<AssociationId, Association>,
    sessions: BTreeMap<SessionId, PlacementSession>,
    dummy_companies: BTreeMap<DummyCompanyId, DummyCompany>,
    dummy_sessions: BTreeMap<DummySessionId, DummySession>,
}

impl StoreState {
    fn placement_listing(
        &self,
        session: &PlacementSession,
    ) -> Result<PlacementListing, RepositoryError> {
        let association = self.associations.get(&session.association).ok_or_else(|| {
            RepositoryError::Integrity(format!(
                "session {} references missing association {}",
                session.id, session.association
            ))
        })?;
        let company = self.companies.get(&association.company).ok_or_else(|| {
            RepositoryError::Integrity(format!(
                "association {} references missing company {}",
                association.id, association.company
            ))
        })?;

        Ok(PlacementListing {
            session: session.clone(),
            association: association.clone(),
            company: company.clone(),
        })
    }

    fn dummy_listing(&self, session: &DummySession) -> Result<DummyListing, RepositoryError> {
        let company = self
            .dummy_companies
            .get(&session.dummy_company)
            .ok_or_else(|| {
                RepositoryError::Integrity(format!(
                    "dummy session {} references missing company {}",
                    session.id, session.dummy_company
                ))
            })?;

        Ok(DummyListing {
            session: session.clone(),
            company: company.clone(),
        })
    }

    fn session_members(
        &mut self,
        session: SessionRef,
    ) -> Result<(&mut BTreeSet<StudentId>, &mut BTreeSet<StudentId>), RepositoryError> {
        match session {
            SessionRef::Placement(id) => self
                .sessions
                .get_mut(&id)
                .map(|record| (&mut record.students, &mut record.applicants))
                .ok_or_else(|| RepositoryError::NotFound(format!("placement session {id}"))),
            SessionRef::Dummy(id) => self
                .dummy_sessions
                .get_mut(&id)
                .map(|record| (&mut record.students, &mut record.applicants))
                .ok_or_else(|| RepositoryError::NotFound(format!("dummy session {id}"))),
        }
    }

    fn forget_student(&mut self, student: StudentId) {
        for session in self.sessions.values_mut() {
            session.students.remove(&student);
            session.applicants.remove(&student);
        }
        for session in self.dummy_sessions.values_mut() {
            session.students.remove(&student);
            session.applicants.remove(&student);
        }
    }
}

/// Process-local store guarded by a single mutex; every call is one critical section.
#[derive(Default)]
pub struct InMemoryPlacementStore {
    state: Mutex<StoreState>,
}

impl InMemoryPlacementStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

fn ordered_by_deadline<T, F>(mut rows: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> (chrono::NaiveDate, u64),
{
    rows.sort_by_key(key);
    rows
}

impl PlacementStore for InMemoryPlacementStore {
    fn college(&self, id: CollegeId) -> Result<Option<College>, RepositoryError> {
        Ok(self.lock()?.colleges.get(&id).cloned())
    }

    fn college_by_code(&self, code: &str) -> Result<Option<College>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .colleges
            .values()
            .find(|college| college.code == code)
            .cloned())
    }

    fn stream(&self, id: StreamId) -> Result<Option<Stream>, RepositoryError> {
        Ok(self.lock()?.streams.get(&id).cloned())
    }

    fn stream_by_code(&self, code: &str) -> Result<Option<Stream>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .streams
            .values()
            .find(|stream| stream.code == code)
            .cloned())
    }

    fn programme(&self, id: ProgrammeId) -> Result<Option<Programme>, RepositoryError> {
        Ok(self.lock()?.programmes.get(&id).cloned())
    }

    fn faculty(&self, id: FacultyId) -> Result<Option<Faculty>, RepositoryError> {
        Ok(self.lock()?.faculty.get(&id).cloned())
    }

    fn student(&self, id: StudentId) -> Result<Option<Student>, RepositoryError> {
        Ok(self.lock()?.students.get(&id).cloned())
    }

    fn student_by_enrollment(
        &self,
        enrollment_no: &str,
    ) -> Result<Option<Student>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .students
            .values()
            .find(|student| student.enrollment_no == enrollment_no)
            .cloned())
    }

    fn insert_student(&self, mut student: Student) -> Result<Student, RepositoryError> {
        let mut state = self.lock()?;
        if state
            .students
            .values()
            .any(|existing| existing.enrollment_no == student.enrollment_no)
        {
            return Err(RepositoryError::Conflict(format!(
                "student {}",
                student.enrollment_no
            )));
        }

        state.next_student_id += 1;
        student.id = StudentId(state.next_student_id);
        student.sessions.clear();
        student.sessions_applied_to.clear();
        state.students.insert(student.id, student.clone());
        Ok(student)
    }

    fn update_student(&self, student: &Student) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let stored = state
            .students
            .get_mut(&student.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("student {}", student.id)))?;

        let sessions = std::mem::take(&mut stored.sessions);
        let applied = std::mem::take(&mut stored.sessions_applied_to);
        *stored = student.clone();
        stored.sessions = sessions;
        stored.sessions_applied_to = applied;
        Ok(())
    }

    fn delete_student(&self, id: StudentId) -> Result<bool, RepositoryError> {
        let mut state = self.lock()?;
        if state.students.remove(&id).is_none() {
            return Ok(false);
        }
        state.forget_student(id);
        Ok(true)
    }

    fn placement_session(
        &self,
        id: SessionId,
    ) -> Result<Option<PlacementListing>, RepositoryError> {
        let state = self.lock()?;
        state
            .sessions
            .get(&id)
            .map(|session| state.placement_listing(session))
            .transpose()
    }

    fn dummy_session(&self, id: DummySessionId) -> Result<Option<DummyListing>, RepositoryError> {
        let state = self.lock()?;
        state
            .dummy_sessions
            .get(&id)
            .map(|session| state.dummy_listing(session))
            .transpose()
    }

    fn query_placement_sessions(
        &self,
        query: &SessionQuery,
    ) -> Result<Vec<PlacementListing>, RepositoryError> {
        let state = self.lock()?;
        let mut rows = Vec::new();
        for session in state.sessions.values() {
            let listing = state.placement_listing(session)?;
            if query.matches(&listing) {
                rows.push(listing);
            }
        }
        Ok(ordered_by_deadline(rows, |row| {
            (row.session.application_deadline, row.session.id.0)
        }))
    }

    fn query_dummy_sessions(
        &self,
        query: &SessionQuery,
    ) -> Result<Vec<DummyListing>, RepositoryError> {
        let state = self.lock()?;
        let mut rows = Vec::new();
        for session in state.dummy_sessions.values() {
            let listing = state.dummy_listing(session)?;
            if query.matches(&listing) {
                rows.push(listing);
            }
        }
        Ok(ordered_by_deadline(rows, |row| {
            (row.session.application_deadline, row.session.id.0)
        }))
    }

    fn change_membership(
        &self,
        student_id: StudentId,
        session: SessionRef,
        change: MembershipChange,
    ) -> Result<ToggleOutcome, RepositoryError> {
        let mut state = self.lock()?;
        if !state.students.contains_key(&student_id) {
            return Err(RepositoryError::NotFound(format!("student {student_id}")));
        }

        let (enrolled, applicants) = state.session_members(session)?;
        if enrolled.contains(&student_id) != change.expects_enrolled() {
            return Err(RepositoryError::Stale(format!(
                "student {student_id} in session {session}"
            )));
        }
        let outcome = change.outcome();
        match change {
            MembershipChange::Join => {
                enrolled.insert(student_id);
                applicants.insert(student_id);
            }
            MembershipChange::Leave => {
                enrolled.remove(&student_id);
            }
        }

        if let Some(student) = state.students.get_mut(&student_id) {
            match outcome {
                ToggleOutcome::Enrolled => {
                    student.sessions.insert(session);
                    student.sessions_applied_to.insert(session);
                }
                ToggleOutcome::Withdrawn => {
                    student.sessions.remove(&session);
                }
            }
        }

        Ok(outcome)
    }
}

impl CatalogStore for InMemoryPlacementStore {
    fn insert_college(&self, college: College) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.colleges.values().any(|existing| existing.code == college.code) {
            return Err(RepositoryError::Conflict(format!("college code {}", college.code)));
        }
        state.colleges.insert(college.id, college);
        Ok(())
    }

    fn insert_programme(&self, programme: Programme) -> Result<(), RepositoryError> {
        self.lock()?.programmes.insert(programme.id, programme);
        Ok(())
    }

    fn insert_stream(&self, stream: Stream) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.streams.values().any(|existing| existing.code == stream.code) {
            return Err(RepositoryError::Conflict(format!("stream code {}", stream.code)));
        }
        state.streams.insert(stream.id, stream);
        Ok(())
    }

    fn insert_company(&self, company: Company) -> Result<(), RepositoryError> {
        self.lock()?.companies.insert(company.id, company);
        Ok(())
    }

    fn insert_faculty(&self, faculty: Faculty) -> Result<(), RepositoryError> {
        self.lock()?.faculty.insert(faculty.id, faculty);
        Ok(())
    }

    fn insert_association(&self, mut association: Association) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        association.session = None;
        state.associations.insert(association.id, association);
        Ok(())
    }

    fn insert_placement_session(
        &self,
        mut session: PlacementSession,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let association = state
            .associations
            .get_mut(&session.association)
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("association {}", session.association))
            })?;
        if association.session.is_some() {
            return Err(RepositoryError::Conflict(format!(
                "association {} already has a session",
                association.id
            )));
        }
        association.session = Some(session.id);

        session.students.clear();
        session.applicants.clear();
        state.sessions.insert(session.id, session);
        Ok(())
    }

    fn insert_dummy_company(&self, company: DummyCompany) -> Result<(), RepositoryError> {
        self.lock()?.dummy_companies.insert(company.id, company);
        Ok(())
    }

    fn insert_dummy_session(&self, mut session: DummySession) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state.dummy_companies.contains_key(&session.dummy_company) {
            return Err(RepositoryError::NotFound(format!(
                "dummy company {}",
                session.dummy_company
            )));
        }
        session.students.clear();
        session.applicants.clear();
        state.dummy_sessions.insert(session.id, session);
        Ok(())
    }

    fn set_session_ended(&self, session: SessionRef, ended: bool) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        match session {
            SessionRef::Placement(id) => {
                let record = state
                    .sessions
                    .get_mut(&id)
                    .ok_or_else(|| RepositoryError::NotFound(format!("placement session {id}")))?;
                record.ended = ended;
            }
            SessionRef::Dummy(id) => {
                let record = state
                    .dummy_sessions
                    .get_mut(&id)
                    .ok_or_else(|| RepositoryError::NotFound(format!("dummy session {id}")))?;
                record.ended = ended;
            }
        }
        Ok(())
    }
}
