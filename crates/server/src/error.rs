//! Unified error handling for the API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{AssistantError, AuthError};

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Chat assistant proxy failed.
    #[error("Assistant error: {0}")]
    Assistant(#[from] AssistantError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Auth(e) => match e {
                AuthError::Misconfigured(_) | AuthError::Signing(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                AuthError::InvalidCredentials
                | AuthError::MissingToken
                | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            },
            Self::Assistant(e) => match e {
                AssistantError::EmptyConversation => StatusCode::BAD_REQUEST,
                AssistantError::Misconfigured => StatusCode::INTERNAL_SERVER_ERROR,
                AssistantError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                AssistantError::Unavailable
                | AssistantError::Http(_)
                | AssistantError::Upstream { .. }
                | AssistantError::EmptyReply => StatusCode::BAD_GATEWAY,
            },
            Self::Database(e) => match e {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Server faults collapse to a generic line so
    /// configuration and database details never leave the process.
    fn message(&self) -> String {
        match self {
            Self::Auth(e) => match e {
                AuthError::Misconfigured(_) | AuthError::Signing(_) => {
                    "Internal server error".to_string()
                }
                _ => e.to_string(),
            },
            Self::Assistant(e) => match e {
                AssistantError::Misconfigured => "Internal server error".to_string(),
                _ => e.to_string(),
            },
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => {
                "Not found".to_string()
            }
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::BadRequest(message) => message.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if self.status().is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "API request error"
            );
        }

        (self.status(), Json(json!({ "message": self.message() }))).into_response()
    }
}
