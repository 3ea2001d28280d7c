//! Chat route handler: the public assistant endpoint.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::state::AppState;

/// Build the chat router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/chat", post(chat))
}

/// Chat request body.
///
/// `messages` is taken as raw JSON; the assistant service owns all
/// normalization of the untrusted conversation.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Value,
}

/// Chat response body.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// Proxy one chat completion for the public site widget.
async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let reply = state.assistant().complete(&request.messages).await?;
    Ok(Json(ChatResponse { reply }))
}
