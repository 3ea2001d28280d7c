//! Authentication extractor for admin routes.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::models::AdminIdentity;
use crate::state::AppState;

/// Extractor that requires an authenticated admin.
///
/// Verifies the `Authorization: Bearer <token>` header against the auth
/// service; any missing or failing token rejects the request with 401.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAdmin(admin): RequireAdmin,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", admin.email)
/// }
/// ```
pub struct RequireAdmin(pub AdminIdentity);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let identity = state.auth().authenticate(header)?;

        Ok(Self(identity))
    }
}
