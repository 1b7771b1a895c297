use chrono::{Duration, NaiveDate};
use metrics_exporter_prometheus::PrometheusHandle;
use placement_cell::workflows::recruitment::{
    Association, AssociationId, CatalogStore, College, CollegeId, Company, CompanyId,
    DummyCompany, DummyCompanyId, DummySession, DummySessionId, Faculty, FacultyId,
    FacultyPermission, PlacementSession, PlacementType, Programme, ProgrammeId,
    RepositoryError, SelectionCriteria, SessionId, SessionKind, Stream, StreamId,
};
use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) const DEMO_COLLEGE_CODE: &str = "164";
pub(crate) const DEMO_FACULTY: FacultyId = FacultyId(1);

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_session_kind(raw: &str) -> Result<SessionKind, String> {
    SessionKind::from_label(raw.trim())
        .ok_or_else(|| format!("unknown session kind '{raw}' (expected placement or dummy)"))
}

/// Whether the demo catalog is already present, so restarts against a database skip seeding.
pub(crate) fn demo_catalog_present<S: CatalogStore>(store: &S) -> Result<bool, RepositoryError> {
    Ok(store.college_by_code(DEMO_COLLEGE_CODE)?.is_some())
}

/// One college with two streams, a verifier, three real sessions and one practice round,
/// dated relative to `today`.
pub(crate) fn seed_demo_catalog<S: CatalogStore>(
    store: &S,
    today: NaiveDate,
) -> Result<(), RepositoryError> {
    store.insert_programme(Programme {
        id: ProgrammeId(1),
        name: "B.Tech".to_string(),
        years: 4,
    })?;
    for (id, code, name) in [(1, "027", "Computer Science"), (2, "031", "Information Technology")] {
        store.insert_stream(Stream {
            id: StreamId(id),
            code: code.to_string(),
            name: name.to_string(),
            programme: ProgrammeId(1),
        })?;
    }
    store.insert_college(College {
        id: CollegeId(1),
        code: DEMO_COLLEGE_CODE.to_string(),
        name: "Maharaja Agrasen Institute of Technology".to_string(),
        streams: BTreeSet::from([StreamId(1), StreamId(2)]),
    })?;
    store.insert_faculty(Faculty {
        id: DEMO_FACULTY,
        username: "placement.officer".to_string(),
        college: CollegeId(1),
        permissions: BTreeSet::from([
            FacultyPermission::Verifier,
            FacultyPermission::StudentDeletion,
        ]),
    })?;

    let offers = [
        (
            1,
            "Acme Analytics",
            PlacementType::Job,
            6,
            5,
            SelectionCriteria::open().with_min_twelfth(60.0),
        ),
        (
            2,
            "Borealis Labs",
            PlacementType::Internship,
            2,
            9,
            SelectionCriteria::open(),
        ),
        (
            3,
            "Cobalt Systems",
            PlacementType::Job,
            12,
            14,
            SelectionCriteria::open().with_min_graduation(75.0).with_max_backlogs(0),
        ),
    ];
    for (id, name, placement_type, salary, days_open, criteria) in offers {
        store.insert_company(Company {
            id: CompanyId(id),
            name: name.to_string(),
        })?;
        store.insert_association(Association {
            id: AssociationId(id),
            company: CompanyId(id),
            college: CollegeId(1),
            placement_type,
            salary,
            streams: BTreeSet::from([StreamId(1), StreamId(2)]),
            approved: true,
            session: None,
        })?;
        store.insert_placement_session(PlacementSession {
            id: SessionId(id),
            association: AssociationId(id),
            application_deadline: today + Duration::days(days_open),
            selection_criteria: criteria,
            ended: false,
            students: BTreeSet::new(),
            applicants: BTreeSet::new(),
        })?;
    }

    store.insert_dummy_company(DummyCompany {
        id: DummyCompanyId(1),
        name: "Mock Interview Day".to_string(),
        college: CollegeId(1),
    })?;
    store.insert_dummy_session(DummySession {
        id: DummySessionId(1),
        dummy_company: DummyCompanyId(1),
        placement_type: PlacementType::Job,
        salary: 3,
        streams: BTreeSet::from([StreamId(1)]),
        application_deadline: today + Duration::days(2),
        selection_criteria: SelectionCriteria::open(),
        ended: false,
        students: BTreeSet::new(),
        applicants: BTreeSet::new(),
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use placement_cell::workflows::recruitment::InMemoryPlacementStore;

    #[test]
    fn demo_catalog_seeds_once() {
        let store = InMemoryPlacementStore::new();
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).expect("valid date");

        assert!(!demo_catalog_present(&store).expect("lookup"));
        seed_demo_catalog(&store, today).expect("seed");
        assert!(demo_catalog_present(&store).expect("lookup"));
        assert!(matches!(
            seed_demo_catalog(&store, today),
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[test]
    fn parses_session_kinds() {
        assert_eq!(parse_session_kind("dummy"), Ok(SessionKind::Dummy));
        assert!(parse_session_kind("mock").is_err());
    }
}
