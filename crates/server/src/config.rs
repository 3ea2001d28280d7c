//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//!
//! ## Optional (auth - absence surfaces as misconfiguration at login time)
//! - `JWT_SECRET` - Token signing secret (min 32 chars recommended)
//! - `ADMIN_EMAIL` - The single operator account email
//! - `ADMIN_PASSWORD` - The single operator account password
//!
//! ## Optional (server)
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `API_PORT` - Listen port (default: 4000)
//!
//! ## Optional (mail - missing host/user/pass is an error only when a real
//! delivery is attempted)
//! - `SMTP_HOST` - SMTP server hostname
//! - `SMTP_PORT` - SMTP port (default: 587)
//! - `SMTP_SECURE` - Implicit TLS (true for port 465 setups, default: false)
//! - `SMTP_USERNAME` - SMTP authentication username
//! - `SMTP_PASSWORD` - SMTP authentication password
//! - `SMTP_FROM` - Sender address (default: `SMTP_USERNAME`)
//! - `SMTP_ALLOW_INVALID_CERTS` - Accept self-signed certificates (default: false)
//! - `SMTP_TLS_FALLBACK_PATTERNS` - Comma-separated substrings that mark a
//!   verification error as a TLS posture mismatch (defaults built in)
//! - `MAIL_TEST_MODE` - Deliver to a local outbox directory instead of SMTP
//! - `MAIL_TEST_DIR` - Outbox directory for test mode (default: temp dir)
//! - `MAIL_DEBUG` - Verbose mail transport logging (default: false)
//! - `NOTIFY_RECIPIENTS` - Comma-separated notification addresses (first 3 used)
//!
//! ## Optional (assistant)
//! - `OPENAI_API_KEY` - Completion API key (absence surfaces at call time)
//! - `OPENAI_BASE_URL` - Completion endpoint override
//! - `OPENAI_MODEL` - Model override (default: gpt-4o-mini)
//! - `ASSISTANT_TIMEOUT_SECS` - Upstream timeout (default: 20)
//!
//! ## Optional (observability)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`,
//!   `SENTRY_TRACES_SAMPLE_RATE`

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const DEFAULT_ASSISTANT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_ASSISTANT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_ASSISTANT_TIMEOUT_SECS: u64 = 20;

/// Default substrings that classify an SMTP verification error as a TLS
/// posture mismatch worth one fallback attempt. Deliberately overridable:
/// the wording varies across TLS backends and library versions.
const DEFAULT_TLS_FALLBACK_PATTERNS: &[&str] = &[
    "wrong version number",
    "handshake",
    "ssl routines",
    "protocol version",
    "record layer failure",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Application configuration.
///
/// Loaded once at startup and passed by reference into every component; no
/// component reads ambient process state directly.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Admin authentication configuration
    pub auth: AuthConfig,
    /// Mail delivery configuration
    pub email: EmailConfig,
    /// Chat assistant configuration
    pub assistant: AssistantConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Admin authentication configuration.
///
/// Every field is optional at load time: the auth service reports a
/// misconfiguration error at call time instead, so the rest of the site
/// keeps serving when the operator account is not set up yet.
///
/// Implements `Debug` manually to redact secrets.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// Token signing secret
    pub jwt_secret: Option<SecretString>,
    /// The single operator account email
    pub admin_email: Option<String>,
    /// The single operator account password
    pub admin_password: Option<SecretString>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .field("admin_email", &self.admin_email)
            .field(
                "admin_password",
                &self.admin_password.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Mail (SMTP) configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: Option<String>,
    /// SMTP server port
    pub smtp_port: u16,
    /// Implicit TLS (port 465 style) rather than STARTTLS
    pub smtp_secure: bool,
    /// SMTP authentication username
    pub smtp_username: Option<String>,
    /// SMTP authentication password
    pub smtp_password: Option<SecretString>,
    /// Email sender address (From header); defaults to the username
    pub from_address: Option<String>,
    /// Accept self-signed/invalid TLS certificates
    pub allow_invalid_certs: bool,
    /// Deliver to a local outbox directory instead of SMTP
    pub test_mode: bool,
    /// Outbox directory used in test mode
    pub test_dir: PathBuf,
    /// Verbose transport logging
    pub debug: bool,
    /// Raw comma-separated notification recipient list
    pub recipients: String,
    /// Substrings classifying a verification error as a TLS posture mismatch
    pub tls_fallback_patterns: Vec<String>,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_secure", &self.smtp_secure)
            .field("smtp_username", &self.smtp_username)
            .field(
                "smtp_password",
                &self.smtp_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("from_address", &self.from_address)
            .field("allow_invalid_certs", &self.allow_invalid_certs)
            .field("test_mode", &self.test_mode)
            .field("test_dir", &self.test_dir)
            .field("debug", &self.debug)
            .field("recipients", &self.recipients)
            .field("tls_fallback_patterns", &self.tls_fallback_patterns)
            .finish()
    }
}

/// Chat assistant (completion API) configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct AssistantConfig {
    /// Completion API key
    pub api_key: Option<SecretString>,
    /// Completion endpoint
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Hard upstream timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `DATABASE_URL` is missing or if a variable
    /// fails to parse. Missing auth/SMTP/API-key variables are not errors
    /// here; the owning component reports them at call time.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_required_env("DATABASE_URL").map(SecretString::from)?;
        let host = get_env_or_default("API_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("API_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("API_PORT", "4000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("API_PORT".to_string(), e.to_string()))?;

        let auth = AuthConfig::from_env();
        let email = EmailConfig::from_env()?;
        let assistant = AssistantConfig::from_env()?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            auth,
            email,
            assistant,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl AuthConfig {
    fn from_env() -> Self {
        let jwt_secret = get_optional_env("JWT_SECRET").map(|value| {
            if value.len() < MIN_JWT_SECRET_LENGTH {
                tracing::warn!(
                    "JWT_SECRET is shorter than {MIN_JWT_SECRET_LENGTH} characters; \
                     use a longer random secret"
                );
            }
            SecretString::from(value)
        });

        Self {
            jwt_secret,
            admin_email: get_optional_env("ADMIN_EMAIL"),
            admin_password: get_optional_env("ADMIN_PASSWORD").map(SecretString::from),
        }
    }
}

impl EmailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let smtp_port = get_env_or_default("SMTP_PORT", "587")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?;

        let smtp_username = get_optional_env("SMTP_USERNAME");
        let from_address = get_optional_env("SMTP_FROM").or_else(|| smtp_username.clone());

        let test_dir = get_optional_env("MAIL_TEST_DIR").map_or_else(
            || std::env::temp_dir().join("crestway-outbox"),
            PathBuf::from,
        );

        let tls_fallback_patterns = get_optional_env("SMTP_TLS_FALLBACK_PATTERNS").map_or_else(
            || {
                DEFAULT_TLS_FALLBACK_PATTERNS
                    .iter()
                    .map(|s| (*s).to_string())
                    .collect()
            },
            |raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_lowercase)
                    .collect()
            },
        );

        Ok(Self {
            smtp_host: get_optional_env("SMTP_HOST"),
            smtp_port,
            smtp_secure: get_bool_env("SMTP_SECURE", false),
            smtp_username,
            smtp_password: get_optional_env("SMTP_PASSWORD").map(SecretString::from),
            from_address,
            allow_invalid_certs: get_bool_env("SMTP_ALLOW_INVALID_CERTS", false),
            test_mode: get_bool_env("MAIL_TEST_MODE", false),
            test_dir,
            debug: get_bool_env("MAIL_DEBUG", false),
            recipients: get_env_or_default("NOTIFY_RECIPIENTS", ""),
            tls_fallback_patterns,
        })
    }
}

impl AssistantConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs = get_env_or_default(
            "ASSISTANT_TIMEOUT_SECS",
            &DEFAULT_ASSISTANT_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("ASSISTANT_TIMEOUT_SECS".to_string(), e.to_string())
        })?;

        Ok(Self {
            api_key: get_optional_env("OPENAI_API_KEY").map(SecretString::from),
            base_url: get_env_or_default("OPENAI_BASE_URL", DEFAULT_ASSISTANT_BASE_URL),
            model: get_env_or_default("OPENAI_MODEL", DEFAULT_ASSISTANT_MODEL),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a boolean environment variable ("1", "true", "yes" are truthy).
fn get_bool_env(key: &str, default: bool) -> bool {
    get_optional_env(key).map_or(default, |v| {
        matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
    })
}
