pub mod health;
pub mod history;
pub mod jobs;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Liveness
        .route("/healthz", get(health::healthz))
        // Jobs (scheduled notifications)
        .route("/v1/jobs", get(jobs::list_jobs))
        .route("/v1/jobs", post(jobs::submit_job))
        .route("/v1/jobs/events", get(jobs::job_events_sse))
        .route("/v1/jobs/:id", get(jobs::get_job))
        .route("/v1/jobs/:id", delete(jobs::cancel_job))
        .route("/v1/jobs/:id/pause", post(jobs::pause_job))
        .route("/v1/jobs/:id/resume", post(jobs::resume_job))
        // Delivery history
        .route("/v1/history", get(history::list_history))
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Map an engine error onto an HTTP status.
pub(crate) fn engine_error(err: chime_domain::Error) -> Response {
    use chime_domain::Error;
    let status = match &err {
        Error::PastScheduleTime(_) | Error::InvalidRecurrenceRule(_) => StatusCode::BAD_REQUEST,
        Error::UnknownJob(_) => StatusCode::NOT_FOUND,
        Error::CannotResumeCompletedJob(_) => StatusCode::CONFLICT,
        Error::Dispatch(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, err.to_string())
}
