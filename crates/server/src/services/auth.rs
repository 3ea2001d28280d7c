//! Admin authentication: credential verification and bearer tokens.
//!
//! The backend has exactly one operator account, configured through the
//! environment. Authentication is fully stateless: a successful login
//! issues a signed token and every protected request is gated on that
//! token alone - no persisted user store, no revocation list.
//!
//! There is deliberately no lockout or rate limiting on login; adding one
//! is an open product decision, not something to slip in silently.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::models::AdminIdentity;

/// Session token lifetime: 1 day.
const TOKEN_TTL_HOURS: i64 = 24;

/// Errors that can occur during authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required credential or the signing secret is not configured.
    ///
    /// Distinct from bad credentials: this is the server's fault.
    #[error("server authentication is not configured: missing {0}")]
    Misconfigured(&'static str),

    /// The supplied email/password pair did not match.
    ///
    /// One variant for every mismatch - the response never reveals which
    /// field was wrong.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// No bearer token was supplied on a protected request.
    #[error("authentication required")]
    MissingToken,

    /// The supplied token failed verification (bad signature, expired, or
    /// malformed - not distinguished to the caller).
    #[error("invalid or expired token")]
    InvalidToken,

    /// Token signing failed.
    #[error("failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Claims carried in an admin session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the admin email.
    pub sub: String,
    /// Role tag, always "admin".
    pub role: String,
    /// Issued-at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub identity: AdminIdentity,
    pub token: String,
}

/// Stateless authentication service for the single operator account.
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    /// Create the service from the auth section of the app configuration.
    #[must_use]
    pub const fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Verify an email/password pair and issue a session token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Misconfigured` when the signing secret or the
    /// operator credential pair is absent, and `AuthError::InvalidCredentials`
    /// for any mismatch (never saying which field was wrong).
    pub fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let secret = self
            .config
            .jwt_secret
            .as_ref()
            .ok_or(AuthError::Misconfigured("JWT_SECRET"))?;
        let admin_email = self
            .config
            .admin_email
            .as_ref()
            .ok_or(AuthError::Misconfigured("ADMIN_EMAIL"))?;
        let admin_password = self
            .config
            .admin_password
            .as_ref()
            .ok_or(AuthError::Misconfigured("ADMIN_PASSWORD"))?;

        if email != admin_email || password != admin_password.expose_secret() {
            return Err(AuthError::InvalidCredentials);
        }

        let token = issue_token(email, secret.expose_secret().as_bytes())?;

        Ok(LoginOutcome {
            identity: AdminIdentity::admin(email),
            token,
        })
    }

    /// Verify the `Authorization` header of a protected request and derive
    /// the admin identity from the token claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingToken` when the header is absent or does
    /// not carry a bearer token, `AuthError::Misconfigured` when no signing
    /// secret is configured, and `AuthError::InvalidToken` for every
    /// verification failure.
    pub fn authenticate(&self, header: Option<&str>) -> Result<AdminIdentity, AuthError> {
        let token = extract_bearer_token(header)?;

        let secret = self
            .config
            .jwt_secret
            .as_ref()
            .ok_or(AuthError::Misconfigured("JWT_SECRET"))?;

        let claims = verify_token(token, secret.expose_secret().as_bytes())?;

        Ok(AdminIdentity {
            name: "Admin".to_string(),
            email: claims.sub,
            role: claims.role,
        })
    }
}

/// Issue a signed session token (HS256, 1-day expiry).
fn issue_token(email: &str, secret: &[u8]) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        sub: email.to_string(),
        role: AdminIdentity::ROLE.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(AuthError::Signing)
}

/// Verify a session token, returning the claims on success.
///
/// Expiry is checked with zero leeway: a token is valid only while the
/// current time is strictly before its expiry.
fn verify_token(token: &str, secret: &[u8]) -> Result<Claims, AuthError> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 0;

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            // The caller only ever sees InvalidToken; the reason stays in the logs.
            tracing::debug!(error = %e, "token verification failed");
            AuthError::InvalidToken
        })
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
fn extract_bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingToken)?;
    let mut parts = header.split_whitespace();

    match (parts.next(), parts.next()) {
        (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            Ok(token)
        }
        _ => Err(AuthError::MissingToken),
    }
}
