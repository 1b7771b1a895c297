use std::collections::BTreeSet;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::recruitment::domain::{
    Faculty, FacultyId, FacultyPermission, SessionId, SessionRef,
};
use crate::workflows::recruitment::eligibility::SelectionCriteria;
use crate::workflows::recruitment::repository::{CatalogStore, PlacementStore};
use crate::workflows::recruitment::router::opportunities_handler;
use crate::workflows::recruitment::{placement_router, EnrollmentService};

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

fn post(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).expect("request")
}

#[tokio::test]
async fn opportunities_route_lists_tokens_not_ids() {
    let (service, store, _) = build_service();
    add_placement(
        store.as_ref(),
        1,
        &SessionFixture::job(days_after(wall_clock_today(), 3)),
    );
    let student = insert_student(store.as_ref(), verified_student());
    let router = placement_router(Arc::new(service));

    let response = router
        .oneshot(get(&format!("/api/v1/students/{student}/opportunities")))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["outcome"], "opportunities");
    let item = &body["jobs"]["unenrolled"][0];
    assert_eq!(item["company_name"], "Acme Analytics");
    assert_eq!(item["origin"], "placement");
    assert!(item["token"].as_str().is_some_and(|token| token.len() >= 8));
    assert!(item.get("session").is_none());
}

#[tokio::test]
async fn toggle_route_enrolls_then_withdraws() {
    let (service, store, notifier) = build_service();
    let session = add_placement(
        store.as_ref(),
        1,
        &SessionFixture::job(days_after(wall_clock_today(), 3)),
    );
    let student = insert_student(store.as_ref(), verified_student());
    let token = service.tokens().encode(session);
    let router = placement_router(Arc::new(service));
    let uri = format!("/api/v1/students/{student}/sessions/{token}/toggle");

    let first = router.clone().oneshot(post(&uri)).await.expect("response");
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(read_json_body(first).await["enrolled"], true);

    let second = router.oneshot(post(&uri)).await.expect("response");
    let body = read_json_body(second).await;
    assert_eq!(body["enrolled"], false);
    assert_eq!(body["outcome"], "withdrawn");
    assert_eq!(notifier.sent().len(), 2);
}

#[tokio::test]
async fn dummy_toggle_route_uses_the_dummy_codec() {
    let (service, store, _) = build_service();
    let session = add_dummy(
        store.as_ref(),
        3,
        &SessionFixture::internship(wall_clock_today()),
    );
    let student = insert_student(store.as_ref(), verified_student());
    let token = service.tokens().encode(session);
    let router = placement_router(Arc::new(service));

    let response = router
        .oneshot(post(&format!(
            "/api/v1/students/{student}/dummy-sessions/{token}/toggle"
        )))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let record = store
        .student(student)
        .expect("lookup")
        .expect("student");
    assert!(record.is_enrolled(session));
}

#[tokio::test]
async fn barred_students_receive_forbidden() {
    let (service, store, _) = build_service();
    let session = add_placement(
        store.as_ref(),
        1,
        &SessionFixture::job(days_after(wall_clock_today(), 3)),
    );
    let mut student = verified_student();
    student.is_barred = true;
    let student = insert_student(store.as_ref(), student);
    let token = service.tokens().encode(session);
    let service = Arc::new(service);

    let response =
        opportunities_handler(State(service.clone()), Path(student.0)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await["outcome"], "barred");

    let response = placement_router(service)
        .oneshot(post(&format!(
            "/api/v1/students/{student}/sessions/{token}/toggle"
        )))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        read_json_body(response).await["error"],
        "Sorry, you have been barred by your college from placements."
    );
}

#[tokio::test]
async fn malformed_tokens_are_bad_requests() {
    let (service, store, _) = build_service();
    let student = insert_student(store.as_ref(), verified_student());
    let router = placement_router(Arc::new(service));

    let response = router
        .oneshot(post(&format!(
            "/api/v1/students/{student}/sessions/123/toggle"
        )))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body["issue"], "malformed_token");
    assert_eq!(body["error"], "Invalid request");
}

#[tokio::test]
async fn eligibility_route_explains_the_verdict() {
    let (service, store, _) = build_service();
    let mut fixture = SessionFixture::job(days_after(wall_clock_today(), 3));
    fixture.criteria = SelectionCriteria::open().with_max_backlogs(0).with_years([4]);
    let session = add_placement(store.as_ref(), 1, &fixture);
    let student = insert_student(store.as_ref(), verified_student());
    let token = service.tokens().encode(session);
    let router = placement_router(Arc::new(service));

    let response = router
        .oneshot(get(&format!(
            "/api/v1/students/{student}/sessions/{token}/eligibility"
        )))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["eligible"], false);
    assert_eq!(body["result"]["verdict"], "ineligible");
    assert_eq!(body["result"]["detail"][0]["rule"], "year_not_eligible");
}

#[tokio::test]
async fn prerequisite_failures_name_what_is_missing() {
    let (service, store, _) = build_service();
    let session = add_placement(
        store.as_ref(),
        1,
        &SessionFixture::job(days_after(wall_clock_today(), 3)),
    );
    let mut student = verified_student();
    student.qualifications = None;
    let student = insert_student(store.as_ref(), student);
    let token = service.tokens().encode(session);
    let router = placement_router(Arc::new(service));

    let response = router
        .oneshot(post(&format!(
            "/api/v1/students/{student}/sessions/{token}/toggle"
        )))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body["missing"], "qualifications_form");
    assert_eq!(
        body["error"],
        "You need to fill the qualifications form before applying."
    );
}

#[tokio::test]
async fn store_outages_map_to_internal_errors() {
    let service = EnrollmentService::new(
        Arc::new(UnavailableStore),
        Arc::new(ClosedDispatcher),
        Arc::new(tokens()),
    );
    let token = service
        .tokens()
        .encode(SessionRef::Placement(SessionId(1)));
    let router = placement_router(Arc::new(service));

    let response = router
        .oneshot(post(&format!("/api/v1/students/1/sessions/{token}/toggle")))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn faculty_download_the_roster_of_their_college_as_csv() {
    let (service, store, _) = build_service();
    let session = add_placement(
        store.as_ref(),
        1,
        &SessionFixture::job(days_after(wall_clock_today(), 3)),
    );
    let asha = insert_student(store.as_ref(), verified_student());
    let mut rohan = verified_student();
    rohan.enrollment_no = "00116402719".to_string();
    rohan.first_name = "Rohan".to_string();
    rohan.last_name = "Mehta".to_string();
    rohan.email = "rohan.mehta@example.edu".to_string();
    let rohan = insert_student(store.as_ref(), rohan);
    insert_student(store.as_ref(), {
        let mut idle = verified_student();
        idle.enrollment_no = "00116402701".to_string();
        idle
    });
    enroll(&service, asha, session);
    enroll(&service, rohan, session);
    let token = service.tokens().encode(session);
    let router = placement_router(Arc::new(service));

    let response = router
        .oneshot(get(&format!(
            "/api/v1/faculty/{VERIFIER}/sessions/{token}/roster"
        )))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["content-type"], "text/csv; charset=utf-8");
    assert_eq!(
        headers["content-disposition"],
        "attachment; filename=\"acme-analytics-job.csv\""
    );
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    let csv = String::from_utf8(body.to_vec()).expect("utf-8");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "Acme Analytics job @ Maharaja Agrasen Institute of Technology"
    );
    assert_eq!(lines[1], "B.Tech - Computer Science");
    assert!(lines[3].starts_with("1,00116402719,Rohan,Mehta,"));
    assert!(lines[4].starts_with("2,00116402720,Asha,Verma,"));
    assert_eq!(lines.len(), 5);
}

#[tokio::test]
async fn rosters_stay_within_the_faculty_college() {
    let (service, store, _) = build_service();
    let session = add_placement(
        store.as_ref(),
        1,
        &SessionFixture::job(days_after(wall_clock_today(), 3)),
    );
    store
        .insert_faculty(Faculty {
            id: FacultyId(2),
            username: "other.officer".to_string(),
            college: OTHER_COLLEGE,
            permissions: BTreeSet::from([FacultyPermission::Verifier]),
        })
        .expect("faculty");
    let token = service.tokens().encode(session);
    let router = placement_router(Arc::new(service));

    let foreign = router
        .clone()
        .oneshot(get(&format!("/api/v1/faculty/2/sessions/{token}/roster")))
        .await
        .expect("response");
    assert_eq!(foreign.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json_body(foreign).await["issue"], "college_mismatch");

    let unknown = router
        .oneshot(get(&format!("/api/v1/faculty/99/sessions/{token}/roster")))
        .await
        .expect("response");
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json_body(unknown).await["issue"], "unknown_faculty");
}
