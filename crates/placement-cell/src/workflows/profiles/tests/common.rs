use std::collections::BTreeSet;
use std::sync::Arc;

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::workflows::profiles::{ProfileDetails, ProfileService, QualificationsForm};
use crate::workflows::recruitment::domain::{
    Association, AssociationId, College, CollegeId, Company, CompanyId, Faculty, FacultyId,
    FacultyPermission, MembershipChange, PlacementSession, PlacementType, Programme, ProgrammeId,
    SessionId, SessionRef, Stream, StreamId, StudentId,
};
use crate::workflows::recruitment::eligibility::SelectionCriteria;
use crate::workflows::recruitment::repository::{CatalogStore, PlacementStore};
use crate::workflows::recruitment::InMemoryPlacementStore;

pub(super) const HOME: CollegeId = CollegeId(1);
pub(super) const ELSEWHERE: CollegeId = CollegeId(2);
/// Verifier who may also delete students.
pub(super) const OFFICER: FacultyId = FacultyId(1);
/// Verifier without deletion rights.
pub(super) const CLERK: FacultyId = FacultyId(2);
/// Verifier from another college.
pub(super) const VISITOR: FacultyId = FacultyId(3);

pub(super) const ENROLLMENT: &str = "00116402720";

pub(super) fn seeded_store() -> Arc<InMemoryPlacementStore> {
    let store = InMemoryPlacementStore::new();
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
            id: HOME,
            code: "164".to_string(),
            name: "Maharaja Agrasen Institute of Technology".to_string(),
            streams: BTreeSet::from([StreamId(1), StreamId(2)]),
        })
        .expect("college");
    store
        .insert_college(College {
            id: ELSEWHERE,
            code: "150".to_string(),
            name: "Bharati Vidyapeeth College of Engineering".to_string(),
            streams: BTreeSet::from([StreamId(1)]),
        })
        .expect("college");

    let faculty = [
        (
            OFFICER,
            "placement.officer",
            HOME,
            vec![FacultyPermission::Verifier, FacultyPermission::StudentDeletion],
        ),
        (CLERK, "verification.desk", HOME, vec![FacultyPermission::Verifier]),
        (VISITOR, "visiting.officer", ELSEWHERE, vec![FacultyPermission::Verifier]),
    ];
    for (id, username, college, permissions) in faculty {
        store
            .insert_faculty(Faculty {
                id,
                username: username.to_string(),
                college,
                permissions: permissions.into_iter().collect(),
            })
            .expect("faculty");
    }
    Arc::new(store)
}

pub(super) fn details() -> ProfileDetails {
    ProfileDetails {
        first_name: "Asha".to_string(),
        last_name: "Verma".to_string(),
        email: "asha.verma@example.edu".to_string(),
        current_year: 3,
    }
}

pub(super) fn form() -> QualificationsForm {
    QualificationsForm {
        tenth_percentage: 88.0,
        twelfth_percentage: 79.5,
        graduation_percentage: Some(72.0),
        active_backlogs: 0,
    }
}

pub(super) fn build_service() -> (
    ProfileService<InMemoryPlacementStore>,
    Arc<InMemoryPlacementStore>,
) {
    let store = seeded_store();
    (ProfileService::new(store.clone()), store)
}

pub(super) fn signed_up(service: &ProfileService<InMemoryPlacementStore>) -> StudentId {
    service
        .create_profile(ENROLLMENT, details())
        .expect("signup")
        .id
}

/// Open job at the home college, one per company; returns its session reference.
pub(super) fn add_company_session<S: CatalogStore>(store: &S, id: u64, name: &str) -> SessionRef {
    store
        .insert_company(Company {
            id: CompanyId(id),
            name: name.to_string(),
        })
        .expect("company");
    store
        .insert_association(Association {
            id: AssociationId(id),
            company: CompanyId(id),
            college: HOME,
            placement_type: PlacementType::Job,
            salary: 4,
            streams: BTreeSet::from([StreamId(1)]),
            approved: true,
            session: None,
        })
        .expect("association");
    store
        .insert_placement_session(PlacementSession {
            id: SessionId(id),
            association: AssociationId(id),
            application_deadline: NaiveDate::from_ymd_opt(2099, 1, 1).expect("date"),
            selection_criteria: SelectionCriteria::open(),
            ended: false,
            students: BTreeSet::new(),
            applicants: BTreeSet::new(),
        })
        .expect("session");
    SessionRef::Placement(SessionId(id))
}

pub(super) fn join<S: PlacementStore>(store: &S, student: StudentId, session: SessionRef) {
    store
        .change_membership(student, session, MembershipChange::Join)
        .expect("join session");
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
