//! Application route handlers: the public admission form endpoint and the
//! admin dashboard operations over submitted applications.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crestway_core::{Email, Phone};

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{ApplicationRecord, Gender, NewApplication, NotificationOutcome};
use crate::state::AppState;

/// Build the applications router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/applications", post(submit).get(list))
        .route("/api/applications/{id}/processed", patch(mark_processed))
        .route("/api/applications/{id}", delete(remove))
        .route("/api/stats", get(stats))
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Public admission form payload.
///
/// Everything arrives as strings from the form; required fields are
/// validated here, optional ones are passed through after trimming.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub dob: Option<NaiveDate>,
    pub nic: Option<String>,
    pub gender: Option<Gender>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub whatsapp: Option<String>,
    pub address: Option<String>,
    pub school: Option<String>,
    pub ol_year: Option<String>,
    pub ol_results: Option<String>,
    pub parent_name: Option<String>,
    pub parent_phone: Option<String>,
    #[serde(default)]
    pub program: String,
    #[serde(default)]
    pub academy: String,
}

/// Response for a successful submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub notifications: NotificationOutcome,
}

/// Response for the admin dashboard stats card.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub applications: i64,
    pub unprocessed: i64,
}

impl SubmitRequest {
    /// Validate the six required fields and produce a persistable record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` naming the offending field.
    fn validate(self) -> Result<NewApplication, AppError> {
        let first_name = required_field(&self.first_name, "firstName")?;
        let last_name = required_field(&self.last_name, "lastName")?;
        let program = required_field(&self.program, "program")?;
        let academy = required_field(&self.academy, "academy")?;

        let email = Email::parse(&self.email)
            .map_err(|e| AppError::BadRequest(format!("email: {e}")))?;
        let phone = Phone::parse(&self.phone)
            .map_err(|e| AppError::BadRequest(format!("phone: {e}")))?;

        Ok(NewApplication {
            first_name,
            last_name,
            dob: self.dob,
            nic: optional_field(self.nic),
            gender: self.gender,
            email,
            phone,
            whatsapp: optional_field(self.whatsapp),
            address: optional_field(self.address),
            school: optional_field(self.school),
            ol_year: optional_field(self.ol_year),
            ol_results: optional_field(self.ol_results),
            parent_name: optional_field(self.parent_name),
            parent_phone: optional_field(self.parent_phone),
            program,
            academy,
        })
    }
}

fn required_field(value: &str, name: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{name} is required")));
    }
    Ok(trimmed.to_string())
}

fn optional_field(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// Handlers
// =============================================================================

/// Submit a new admission application (public).
///
/// Persists first, then dispatches notifications best-effort: a dispatch
/// failure is folded into the outcome counts and never invalidates the
/// submitter's 201.
async fn submit(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let new = request.validate()?;
    let record = state.store().create(new).await?;

    tracing::info!(id = %record.id, program = %record.program, "application submitted");

    let notifications = dispatch_notifications(&state, &record).await;

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            id: record.id,
            created_at: record.created_at,
            notifications,
        }),
    ))
}

/// Dispatch notifications for a persisted application, converting any
/// dispatcher error into a total-failure outcome.
async fn dispatch_notifications(
    state: &AppState,
    record: &ApplicationRecord,
) -> NotificationOutcome {
    match state.notifier().dispatch(record).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            tracing::error!(
                error = %e,
                sentry_event_id = %event_id,
                id = %record.id,
                "notification dispatch failed"
            );
            NotificationOutcome::all_failed(state.notifier().configured_recipient_count())
        }
    }
}

/// List all applications, newest first (admin).
async fn list(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<ApplicationRecord>>, AppError> {
    let applications = state.store().find().await?;
    Ok(Json(applications))
}

/// Mark an application as processed (admin).
async fn mark_processed(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicationRecord>, AppError> {
    let record = state.store().mark_processed(id).await?;
    Ok(Json(record))
}

/// Delete an application (admin).
async fn remove(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.store().delete_by_id(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Dashboard counts (admin).
async fn stats(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, AppError> {
    let applications = state.store().count_total().await?;
    let unprocessed = state.store().count_unprocessed().await?;

    Ok(Json(StatsResponse {
        applications,
        unprocessed,
    }))
}
