//! Job submission + lifecycle + SSE events API.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Utc};
use futures_util::stream::Stream;
use serde::Deserialize;

use chime_domain::config::DispatchMode;
use chime_engine::{Job, JobEvent, Payload, Priority, RecurrenceRule};

use super::{api_error, engine_error};
use crate::dispatch::validate_url;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/jobs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub title: String,
    pub message: String,
    /// Destination understood by the configured dispatcher.
    pub destination: String,
    #[serde(default)]
    pub priority: Priority,
    /// Omitted = deliver immediately, bypassing the scheduler.
    #[serde(default)]
    pub schedule_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recurrence: Option<RecurrenceRule>,
}

pub async fn submit_job(
    State(state): State<AppState>,
    Json(req): Json<SubmitJobRequest>,
) -> Response {
    // Webhook destinations must be safe URLs (SSRF prevention).
    if state.config.dispatch.mode == DispatchMode::Webhook {
        if let Err(msg) = validate_url(&req.destination) {
            return api_error(
                StatusCode::BAD_REQUEST,
                format!("invalid destination URL '{}': {}", req.destination, msg),
            );
        }
    }

    let payload = Payload {
        title: req.title,
        message: req.message,
        destination: req.destination,
        priority: req.priority,
    };

    match req.schedule_time {
        // No schedule time: "send immediately" request.
        None => match state.scheduler.dispatch_now(payload).await {
            Ok(entry) if entry.success => {
                Json(serde_json::json!({ "delivered": true, "entry": entry })).into_response()
            }
            Ok(entry) => (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "delivered": false, "entry": entry })),
            )
                .into_response(),
            Err(e) => engine_error(e),
        },
        Some(at) => match state.scheduler.submit(payload, at, req.recurrence).await {
            Ok(id) => {
                let job = state.scheduler.get(&id).map(|j| j.to_view());
                (
                    StatusCode::CREATED,
                    Json(serde_json::json!({ "job": job })),
                )
                    .into_response()
            }
            Err(e) => engine_error(e),
        },
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/jobs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    let jobs = state.scheduler.list();
    let views: Vec<_> = jobs.iter().map(|j| j.to_view()).collect();
    let count = views.len();
    Json(serde_json::json!({
        "jobs": views,
        "count": count,
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/jobs/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> impl IntoResponse {
    match state.scheduler.get(&id) {
        Some(job) => {
            let next_occurrences = preview_occurrences(&job, 5);
            Json(serde_json::json!({
                "job": job.to_view(),
                "next_occurrences": next_occurrences,
            }))
            .into_response()
        }
        None => api_error(StatusCode::NOT_FOUND, "job not found"),
    }
}

/// Project the next few occurrences for display. An approximation for
/// recurring jobs — the engine re-anchors to the actual fire time — but
/// close enough to answer "when will this remind me next".
fn preview_occurrences(job: &Job, n: usize) -> Vec<DateTime<Utc>> {
    let mut out = Vec::new();
    let Some(mut cursor) = job.next_fire_time else {
        return out;
    };
    out.push(cursor);
    if let Some(rule) = &job.recurrence {
        while out.len() < n {
            match chime_engine::next_occurrence(cursor, rule) {
                Ok(next) if rule.end_time.map_or(true, |end| next <= end) => {
                    out.push(next);
                    cursor = next;
                }
                _ => break,
            }
        }
    }
    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /v1/jobs/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Response {
    match state.scheduler.cancel(id).await {
        Ok(true) => Json(serde_json::json!({ "cancelled": true })).into_response(),
        Ok(false) => api_error(StatusCode::NOT_FOUND, "job not found"),
        Err(e) => engine_error(e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/jobs/:id/pause — POST /v1/jobs/:id/resume
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn pause_job(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Response {
    match state.scheduler.pause(id).await {
        Ok(true) => {
            let job = state.scheduler.get(&id).map(|j| j.to_view());
            Json(serde_json::json!({ "job": job })).into_response()
        }
        Ok(false) => api_error(StatusCode::NOT_FOUND, "job not found"),
        Err(e) => engine_error(e),
    }
}

pub async fn resume_job(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Response {
    match state.scheduler.resume(id).await {
        Ok(job) => Json(serde_json::json!({ "job": job.to_view() })).into_response(),
        Err(e) => engine_error(e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/jobs/events (SSE)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn job_events_sse(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let mut rx = state.scheduler.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let event_type = match &event {
                        JobEvent::JobUpdated { .. } => "job.updated",
                        JobEvent::JobFired { .. } => "job.fired",
                    };
                    if let Ok(json) = serde_json::to_string(&event) {
                        yield Ok(Event::default().event(event_type).data(json));
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    };

    Sse::new(stream)
}
