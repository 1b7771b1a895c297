use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::service::{ProfileDetails, ProfileError, ProfileService, QualificationsForm};
use crate::workflows::recruitment::domain::{FacultyId, StudentId};
use crate::workflows::recruitment::repository::PlacementStore;
use crate::workflows::recruitment::router::run_blocking;

#[derive(Debug, Deserialize)]
pub(crate) struct SignupRequest {
    enrollment_no: String,
    #[serde(flatten)]
    details: ProfileDetails,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PaygradeRequest {
    lpa: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerdictRequest {
    #[serde(default)]
    verdict: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BarRequest {
    barred: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeletionRequest {
    #[serde(default)]
    reason: Option<String>,
}

/// Router for student self-service and faculty moderation.
pub fn profile_router<S>(service: Arc<ProfileService<S>>) -> Router
where
    S: PlacementStore + 'static,
{
    Router::new()
        .route("/api/v1/students", post(signup_handler::<S>))
        .route(
            "/api/v1/students/:student_id/profile",
            put(edit_profile_handler::<S>),
        )
        .route(
            "/api/v1/students/:student_id/qualifications",
            put(qualifications_handler::<S>),
        )
        .route(
            "/api/v1/students/:student_id/paygrade",
            put(paygrade_handler::<S>),
        )
        .route(
            "/api/v1/students/:student_id/public",
            get(public_profile_handler::<S>),
        )
        .route(
            "/api/v1/faculty/:faculty_id/students/:student_id/verification",
            post(verify_profile_handler::<S>),
        )
        .route(
            "/api/v1/faculty/:faculty_id/students/:student_id/qualifications-verification",
            post(verify_qualifications_handler::<S>),
        )
        .route(
            "/api/v1/faculty/:faculty_id/students/:student_id/bar",
            post(bar_handler::<S>),
        )
        .route(
            "/api/v1/faculty/:faculty_id/students/:student_id/deletion",
            post(delete_handler::<S>),
        )
        .with_state(service)
}

pub(crate) fn error_response(error: ProfileError) -> Response {
    let status = match &error {
        ProfileError::PermissionDenied | ProfileError::CollegeMismatch => StatusCode::FORBIDDEN,
        ProfileError::UnknownStudent | ProfileError::UnknownFaculty => StatusCode::NOT_FOUND,
        ProfileError::AlreadyRegistered => StatusCode::CONFLICT,
        ProfileError::Store(err) => {
            tracing::error!(error = %err, "profile store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_REQUEST,
    };

    (status, axum::Json(json!({ "error": error.to_string() }))).into_response()
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, ProfileError>) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn signup_handler<S>(
    State(service): State<Arc<ProfileService<S>>>,
    axum::Json(request): axum::Json<SignupRequest>,
) -> Response
where
    S: PlacementStore + 'static,
{
    run_blocking(move || {
        respond(
            StatusCode::CREATED,
            service.create_profile(&request.enrollment_no, request.details),
        )
    })
    .await
}

async fn edit_profile_handler<S>(
    State(service): State<Arc<ProfileService<S>>>,
    Path(student_id): Path<u64>,
    axum::Json(details): axum::Json<ProfileDetails>,
) -> Response
where
    S: PlacementStore + 'static,
{
    run_blocking(move || {
        respond(
            StatusCode::OK,
            service.edit_profile(StudentId(student_id), details),
        )
    })
    .await
}

async fn qualifications_handler<S>(
    State(service): State<Arc<ProfileService<S>>>,
    Path(student_id): Path<u64>,
    axum::Json(form): axum::Json<QualificationsForm>,
) -> Response
where
    S: PlacementStore + 'static,
{
    run_blocking(move || {
        respond(
            StatusCode::OK,
            service.submit_qualifications(StudentId(student_id), form),
        )
    })
    .await
}

async fn paygrade_handler<S>(
    State(service): State<Arc<ProfileService<S>>>,
    Path(student_id): Path<u64>,
    axum::Json(request): axum::Json<PaygradeRequest>,
) -> Response
where
    S: PlacementStore + 'static,
{
    run_blocking(move || {
        respond(
            StatusCode::OK,
            service
                .set_paygrade(StudentId(student_id), request.lpa)
                .map(|student| json!({ "salary_expected": student.salary_expected })),
        )
    })
    .await
}

async fn public_profile_handler<S>(
    State(service): State<Arc<ProfileService<S>>>,
    Path(student_id): Path<u64>,
) -> Response
where
    S: PlacementStore + 'static,
{
    run_blocking(move || {
        respond(
            StatusCode::OK,
            service.public_summary(StudentId(student_id)).map(|profile| {
                json!({
                    "name": profile.name,
                    "college": profile.college,
                    "stream": profile.stream,
                    "current_year": profile.current_year,
                    "sessions": profile.placement_sessions,
                    "companies": profile.company_line(),
                })
            }),
        )
    })
    .await
}

async fn verify_profile_handler<S>(
    State(service): State<Arc<ProfileService<S>>>,
    Path((faculty_id, student_id)): Path<(u64, u64)>,
    axum::Json(request): axum::Json<VerdictRequest>,
) -> Response
where
    S: PlacementStore + 'static,
{
    run_blocking(move || {
        respond(
            StatusCode::OK,
            service
                .verify_profile(FacultyId(faculty_id), StudentId(student_id), request.verdict)
                .map(|student| json!({ "verification": student.verification })),
        )
    })
    .await
}

async fn verify_qualifications_handler<S>(
    State(service): State<Arc<ProfileService<S>>>,
    Path((faculty_id, student_id)): Path<(u64, u64)>,
    axum::Json(request): axum::Json<VerdictRequest>,
) -> Response
where
    S: PlacementStore + 'static,
{
    run_blocking(move || {
        let faculty = FacultyId(faculty_id);
        respond(
            StatusCode::OK,
            service
                .verify_qualifications(faculty, StudentId(student_id), request.verdict)
                .map(|student| {
                    json!({
                        "verification": student.qualifications.map(|q| q.verification),
                    })
                }),
        )
    })
    .await
}

async fn bar_handler<S>(
    State(service): State<Arc<ProfileService<S>>>,
    Path((faculty_id, student_id)): Path<(u64, u64)>,
    axum::Json(request): axum::Json<BarRequest>,
) -> Response
where
    S: PlacementStore + 'static,
{
    run_blocking(move || {
        respond(
            StatusCode::OK,
            service
                .set_barred(FacultyId(faculty_id), StudentId(student_id), request.barred)
                .map(|student| json!({ "is_barred": student.is_barred })),
        )
    })
    .await
}

async fn delete_handler<S>(
    State(service): State<Arc<ProfileService<S>>>,
    Path((faculty_id, student_id)): Path<(u64, u64)>,
    axum::Json(request): axum::Json<DeletionRequest>,
) -> Response
where
    S: PlacementStore + 'static,
{
    run_blocking(move || {
        match service.delete_student(
            FacultyId(faculty_id),
            StudentId(student_id),
            request.reason.as_deref(),
        ) {
            Ok(()) => StatusCode::NO_CONTENT.into_response(),
            Err(error) => error_response(error),
        }
    })
    .await
}
