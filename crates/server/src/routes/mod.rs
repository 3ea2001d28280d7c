//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                          - Liveness check
//! GET    /health/ready                    - Readiness check (DB ping)
//!
//! # Auth (public)
//! POST   /api/auth/login                  - Verify credentials, issue token
//!
//! # Applications
//! POST   /api/applications                - Submit an application (public)
//! GET    /api/applications                - List applications (admin)
//! PATCH  /api/applications/{id}/processed - Mark processed (admin)
//! DELETE /api/applications/{id}           - Delete an application (admin)
//! GET    /api/stats                       - Dashboard counts (admin)
//!
//! # Chat (public)
//! POST   /api/chat                        - Chat assistant proxy
//! ```

pub mod applications;
pub mod auth;
pub mod chat;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;

use crate::state::AppState;

/// Build the full application router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(auth::router())
        .merge(applications::router())
        .merge(chat::router())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
