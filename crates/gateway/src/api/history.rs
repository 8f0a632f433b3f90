//! Delivery-history API — every dispatch attempt, most recent first.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListHistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

pub async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<ListHistoryQuery>,
) -> impl IntoResponse {
    let entries = state.scheduler.history(query.limit);
    let count = entries.len();
    Json(serde_json::json!({
        "entries": entries,
        "count": count,
    }))
}
