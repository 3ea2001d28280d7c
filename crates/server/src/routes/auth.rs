//! Auth route handlers.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::AdminIdentity;
use crate::state::AppState;

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/auth/login", post(login))
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: AdminIdentity,
    pub token: String,
}

/// Verify the operator credentials and issue a session token.
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let outcome = state.auth().login(&request.email, &request.password)?;

    tracing::info!(email = %outcome.identity.email, "admin logged in");

    Ok(Json(LoginResponse {
        user: outcome.identity,
        token: outcome.token,
    }))
}
