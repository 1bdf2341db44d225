use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
    }))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.pipeline.sessions().stats();
    Json(json!({
        "status": "ok",
        "startedAt": state.started_at.to_rfc3339(),
        "products": state.pipeline.catalog().len(),
        "activeSessions": stats.active_sessions,
        "totalMessages": stats.total_messages,
    }))
}
