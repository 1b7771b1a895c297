use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDate};
use serde_json::json;

use super::domain::{FacultyId, SessionKind, StudentId};
use super::repository::{NotificationDispatcher, PlacementStore, RepositoryError};
use super::service::{EnrollmentError, EnrollmentService};

/// Router exposing the opportunities board, eligibility checks and the enrollment toggle to
/// students, plus session rosters to faculty.
pub fn placement_router<S, N>(service: Arc<EnrollmentService<S, N>>) -> Router
where
    S: PlacementStore + 'static,
    N: NotificationDispatcher + 'static,
{
    Router::new()
        .route(
            "/api/v1/students/:student_id/opportunities",
            get(opportunities_handler::<S, N>),
        )
        .route(
            "/api/v1/students/:student_id/sessions/:token/eligibility",
            get(placement_eligibility_handler::<S, N>),
        )
        .route(
            "/api/v1/students/:student_id/dummy-sessions/:token/eligibility",
            get(dummy_eligibility_handler::<S, N>),
        )
        .route(
            "/api/v1/students/:student_id/sessions/:token/toggle",
            post(placement_toggle_handler::<S, N>),
        )
        .route(
            "/api/v1/students/:student_id/dummy-sessions/:token/toggle",
            post(dummy_toggle_handler::<S, N>),
        )
        .route(
            "/api/v1/faculty/:faculty_id/sessions/:token/roster",
            get(placement_roster_handler::<S, N>),
        )
        .route(
            "/api/v1/faculty/:faculty_id/dummy-sessions/:token/roster",
            get(dummy_roster_handler::<S, N>),
        )
        .with_state(service)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Run a store-bound handler body on the blocking pool so a contended SQLite connection never
/// stalls the async workers.
pub(crate) async fn run_blocking<F>(work: F) -> Response
where
    F: FnOnce() -> Response + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, "blocking handler task failed");
            let payload = json!({ "error": "internal error" });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) fn error_response(error: EnrollmentError) -> Response {
    let status = match &error {
        EnrollmentError::Forbidden => StatusCode::FORBIDDEN,
        EnrollmentError::Store(RepositoryError::Stale(_)) => StatusCode::CONFLICT,
        EnrollmentError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EnrollmentError::PrerequisiteMissing(_)
        | EnrollmentError::NotEligible { .. }
        | EnrollmentError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
    };

    let mut payload = json!({ "error": error.to_string() });
    match &error {
        EnrollmentError::PrerequisiteMissing(missing) => payload["missing"] = json!(missing),
        EnrollmentError::NotEligible { reasons, .. } => payload["reasons"] = json!(reasons),
        EnrollmentError::InvalidRequest(issue) => payload["issue"] = json!(issue),
        EnrollmentError::Store(err) => {
            tracing::error!(error = %err, "placement store failure");
        }
        EnrollmentError::Forbidden => {}
    }

    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn opportunities_handler<S, N>(
    State(service): State<Arc<EnrollmentService<S, N>>>,
    Path(student_id): Path<u64>,
) -> Response
where
    S: PlacementStore + 'static,
    N: NotificationDispatcher + 'static,
{
    run_blocking(move || {
        match service.list_opportunities(StudentId(student_id), today()) {
            Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
            Err(error) => error_response(error),
        }
    })
    .await
}

async fn placement_eligibility_handler<S, N>(
    State(service): State<Arc<EnrollmentService<S, N>>>,
    Path((student_id, token)): Path<(u64, String)>,
) -> Response
where
    S: PlacementStore + 'static,
    N: NotificationDispatcher + 'static,
{
    run_blocking(move || {
        eligibility(&service, StudentId(student_id), SessionKind::Placement, &token)
    })
    .await
}

async fn dummy_eligibility_handler<S, N>(
    State(service): State<Arc<EnrollmentService<S, N>>>,
    Path((student_id, token)): Path<(u64, String)>,
) -> Response
where
    S: PlacementStore + 'static,
    N: NotificationDispatcher + 'static,
{
    run_blocking(move || {
        eligibility(&service, StudentId(student_id), SessionKind::Dummy, &token)
    })
    .await
}

fn eligibility<S, N>(
    service: &EnrollmentService<S, N>,
    student: StudentId,
    kind: SessionKind,
    token: &str,
) -> Response
where
    S: PlacementStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let verdict = service
        .resolve_token(kind, token)
        .and_then(|session| service.evaluate(student, session));

    match verdict {
        Ok(verdict) => {
            let payload = json!({
                "eligible": verdict.is_eligible(),
                "summary": verdict.summary(),
                "result": verdict,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn placement_toggle_handler<S, N>(
    State(service): State<Arc<EnrollmentService<S, N>>>,
    Path((student_id, token)): Path<(u64, String)>,
) -> Response
where
    S: PlacementStore + 'static,
    N: NotificationDispatcher + 'static,
{
    run_blocking(move || toggle(&service, StudentId(student_id), SessionKind::Placement, &token))
        .await
}

async fn dummy_toggle_handler<S, N>(
    State(service): State<Arc<EnrollmentService<S, N>>>,
    Path((student_id, token)): Path<(u64, String)>,
) -> Response
where
    S: PlacementStore + 'static,
    N: NotificationDispatcher + 'static,
{
    run_blocking(move || toggle(&service, StudentId(student_id), SessionKind::Dummy, &token))
        .await
}

fn toggle<S, N>(
    service: &EnrollmentService<S, N>,
    student: StudentId,
    kind: SessionKind,
    token: &str,
) -> Response
where
    S: PlacementStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let outcome = service
        .resolve_token(kind, token)
        .and_then(|session| service.toggle_application(student, session, today()));

    match outcome {
        Ok(outcome) => {
            let payload = json!({
                "enrolled": outcome.is_enrolled(),
                "outcome": outcome,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn placement_roster_handler<S, N>(
    State(service): State<Arc<EnrollmentService<S, N>>>,
    Path((faculty_id, token)): Path<(u64, String)>,
) -> Response
where
    S: PlacementStore + 'static,
    N: NotificationDispatcher + 'static,
{
    run_blocking(move || roster(&service, FacultyId(faculty_id), SessionKind::Placement, &token))
        .await
}

async fn dummy_roster_handler<S, N>(
    State(service): State<Arc<EnrollmentService<S, N>>>,
    Path((faculty_id, token)): Path<(u64, String)>,
) -> Response
where
    S: PlacementStore + 'static,
    N: NotificationDispatcher + 'static,
{
    run_blocking(move || roster(&service, FacultyId(faculty_id), SessionKind::Dummy, &token))
        .await
}

fn roster<S, N>(
    service: &EnrollmentService<S, N>,
    faculty: FacultyId,
    kind: SessionKind,
    token: &str,
) -> Response
where
    S: PlacementStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let roster = match service
        .resolve_token(kind, token)
        .and_then(|session| service.session_roster(faculty, session))
    {
        Ok(roster) => roster,
        Err(error) => return error_response(error),
    };

    match roster.to_csv() {
        Ok(body) => {
            let disposition = format!("attachment; filename=\"{}\"", roster.file_name());
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "session roster rendering failed");
            let payload = json!({ "error": "internal error" });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
