//! Crestway Academy backend library.
//!
//! Serves the public site API (admission form, chat assistant) and the
//! admin dashboard API (application review, stats) from one binary.
//!
//! # Architecture
//!
//! - Axum web framework, JSON API only
//! - `PostgreSQL` for submitted applications, behind the
//!   [`db::ApplicationStore`] seam
//! - Stateless bearer-token auth for the single operator account
//! - SMTP notification dispatch on each submission
//! - External completion API behind the chat proxy

#![cfg_attr(not(test), forbid(unsafe_code))]

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower_http::cors::CorsLayer;

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

/// Largest accepted request body. The admission form and the chat widget
/// carry only text fields, so anything near this is abuse, not a real
/// request.
pub const MAX_BODY_BYTES: usize = 2_000_000;

/// Build the application with its request-shaping layers.
///
/// This is the router the binary serves and the tests exercise: the body
/// cap and CORS policy apply to both. Observability layers (tracing,
/// sentry) are added by the binary on top.
#[must_use]
pub fn app(state: state::AppState) -> Router {
    routes::router()
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        // The public site is served from a separate origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}
