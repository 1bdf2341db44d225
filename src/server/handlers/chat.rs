use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

pub async fn post_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.question.trim().is_empty() {
        return Err(ApiError::BadRequest("Question is required".to_string()));
    }

    let response = state
        .pipeline
        .ask_question(&request.question, request.session_id)
        .await;

    Ok(Json(response))
}
