use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::domain::ExternalStudentId;
use super::repository::{RepositoryError, ScreeningRepository, StudentDirectory};
use super::service::{ScreeningService, ScreeningServiceError, StudentSearch, SubmissionStatus};
use super::student_update::StudentUpdate;
use super::submission::ScreeningSubmission;

/// Router builder exposing screening intake and student lookup endpoints.
pub fn screening_router<D, R>(service: Arc<ScreeningService<D, R>>) -> Router
where
    D: StudentDirectory + 'static,
    R: ScreeningRepository + 'static,
{
    Router::new()
        .route("/api/screenings", post(submit_handler::<D, R>))
        .route("/api/students/search", get(search_handler::<D, R>))
        .route(
            "/api/students/:unique_id",
            get(student_handler::<D, R>).put(update_student_handler::<D, R>),
        )
        .route("/api/schools", get(schools_handler::<D, R>))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchParams {
    #[serde(rename = "lastName")]
    pub(crate) last_name: Option<String>,
    pub(crate) school: Option<String>,
}

#[derive(Serialize)]
struct Found<T> {
    found: bool,
    #[serde(flatten)]
    body: T,
}

#[derive(Serialize)]
struct Saved<T> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

#[derive(Serialize)]
struct SchoolEntry {
    name: String,
}

pub(crate) async fn submit_handler<D, R>(
    State(service): State<Arc<ScreeningService<D, R>>>,
    payload: Result<Json<ScreeningSubmission>, JsonRejection>,
) -> Response
where
    D: StudentDirectory + 'static,
    R: ScreeningRepository + 'static,
{
    let submission = match payload {
        Ok(Json(submission)) => submission,
        Err(rejection) => {
            warn!(error = %rejection, "rejected malformed screening payload");
            return failure(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    match service.submit(submission) {
        Ok(outcome) => {
            let code = match outcome.status {
                SubmissionStatus::Created => StatusCode::CREATED,
                SubmissionStatus::Updated => StatusCode::OK,
            };
            let payload = json!({
                "success": true,
                "status": outcome.status.label(),
                "message": outcome.status.message(),
                "data": outcome.record,
            });
            (code, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn student_handler<D, R>(
    State(service): State<Arc<ScreeningService<D, R>>>,
    Path(unique_id): Path<String>,
) -> Response
where
    D: StudentDirectory + 'static,
    R: ScreeningRepository + 'static,
{
    let unique_id = ExternalStudentId(unique_id);
    match service.student_overview(&unique_id) {
        Ok(overview) => (
            StatusCode::OK,
            Json(Found {
                found: true,
                body: overview,
            }),
        )
            .into_response(),
        Err(ScreeningServiceError::StudentNotFound(_)) => {
            (StatusCode::NOT_FOUND, Json(json!({ "found": false }))).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_student_handler<D, R>(
    State(service): State<Arc<ScreeningService<D, R>>>,
    Path(unique_id): Path<String>,
    payload: Result<Json<StudentUpdate>, JsonRejection>,
) -> Response
where
    D: StudentDirectory + 'static,
    R: ScreeningRepository + 'static,
{
    let update = match payload {
        Ok(Json(update)) => update,
        Err(rejection) => {
            warn!(error = %rejection, "rejected malformed student update");
            return failure(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    match service.update_student(&ExternalStudentId(unique_id), update) {
        Ok(overview) => (
            StatusCode::OK,
            Json(Saved {
                success: true,
                body: overview,
            }),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn schools_handler<D, R>(
    State(service): State<Arc<ScreeningService<D, R>>>,
) -> Response
where
    D: StudentDirectory + 'static,
    R: ScreeningRepository + 'static,
{
    match service.schools() {
        Ok(schools) => {
            let entries: Vec<SchoolEntry> =
                schools.into_iter().map(|name| SchoolEntry { name }).collect();
            (StatusCode::OK, Json(entries)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn search_handler<D, R>(
    State(service): State<Arc<ScreeningService<D, R>>>,
    Query(params): Query<SearchParams>,
) -> Response
where
    D: StudentDirectory + 'static,
    R: ScreeningRepository + 'static,
{
    match service.search_students(params.last_name.as_deref(), params.school.as_deref()) {
        Ok(StudentSearch::NoMatch) => {
            (StatusCode::OK, Json(json!({ "found": false }))).into_response()
        }
        Ok(StudentSearch::Single(overview)) => (
            StatusCode::OK,
            Json(Found {
                found: true,
                body: overview,
            }),
        )
            .into_response(),
        Ok(StudentSearch::Multiple(students)) => {
            let payload = json!({
                "found": true,
                "multiple": true,
                "students": students,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

fn error_response(error: ScreeningServiceError) -> Response {
    let code = match &error {
        ScreeningServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ScreeningServiceError::StudentNotFound(_) => StatusCode::NOT_FOUND,
        ScreeningServiceError::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
        ScreeningServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if code == StatusCode::INTERNAL_SERVER_ERROR {
        warn!(error = %error, "screening request failed");
    }
    failure(code, error.to_string())
}

fn failure(code: StatusCode, message: String) -> Response {
    let payload = json!({
        "success": false,
        "error": message,
    });
    (code, Json(payload)).into_response()
}
