//! Application-submission notification dispatch.
//!
//! After an application is persisted, a plaintext summary is sent to up to
//! three configured staff addresses. Delivery is best-effort: the caller
//! catches configuration errors and reports the submission as successful
//! regardless, and a single recipient's failure never aborts the batch.
//!
//! Two delivery modes exist: real SMTP via lettre, and a test mode that
//! writes `.eml` files into a local outbox directory, with the written
//! path reported as a preview link.

use std::path::{Path, PathBuf};

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;
use crate::models::{ApplicationRecord, NotificationOutcome};

/// Hard cap on notification addresses honored per dispatch.
const MAX_RECIPIENTS: usize = 3;

/// Conventional ports for the two TLS postures.
const IMPLICIT_TLS_PORT: u16 = 465;
const STARTTLS_PORT: u16 = 587;

/// Errors that abort a dispatch before any send is attempted.
///
/// These are configuration problems; the caller converts them into a
/// total-failure outcome rather than failing the submission.
#[derive(Debug, Error)]
pub enum NotifierError {
    /// A required SMTP setting is absent in real-delivery mode.
    #[error("mail transport is not configured: missing {0}")]
    Misconfigured(&'static str),

    /// The configured sender address does not parse.
    #[error("invalid sender address: {0}")]
    InvalidSender(String),

    /// Building TLS parameters for the SMTP transport failed.
    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// The test-mode outbox directory could not be created.
    #[error("failed to prepare outbox directory: {0}")]
    Outbox(#[from] std::io::Error),
}

/// Per-recipient send failure. Counted, never propagated.
#[derive(Debug, Error)]
enum SendError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("file transport error: {0}")]
    File(#[from] lettre::transport::file::Error),
}

/// TLS posture of an SMTP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TlsPosture {
    /// Implicit TLS from the first byte (port 465 style).
    Implicit,
    /// Plain connection upgraded via STARTTLS (port 587 style).
    StartTls,
}

impl TlsPosture {
    /// The opposite posture together with its conventional port, used for
    /// the single fallback reconnection after a TLS mismatch.
    const fn inverse(self) -> (Self, u16) {
        match self {
            Self::Implicit => (Self::StartTls, STARTTLS_PORT),
            Self::StartTls => (Self::Implicit, IMPLICIT_TLS_PORT),
        }
    }
}

/// One delivery transport, built fresh per dispatch.
#[derive(Debug)]
enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File {
        inner: AsyncFileTransport<Tokio1Executor>,
        dir: PathBuf,
    },
}

/// Notification dispatcher for submitted applications.
#[derive(Clone)]
pub struct Notifier {
    config: EmailConfig,
}

impl Notifier {
    /// Create the dispatcher from the mail section of the app configuration.
    #[must_use]
    pub const fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Number of recipients a dispatch would attempt (already capped).
    ///
    /// Used by the caller to report a total-failure outcome when dispatch
    /// itself errors.
    #[must_use]
    pub fn configured_recipient_count(&self) -> u32 {
        u32::try_from(resolve_recipients(&self.config.recipients).len()).unwrap_or(0)
    }

    /// Send the new-application summary to every configured recipient.
    ///
    /// Sends are attempted strictly sequentially in recipient-list order;
    /// a failed recipient is counted and the loop continues.
    ///
    /// # Errors
    ///
    /// Returns `NotifierError` only for configuration-level problems
    /// (missing SMTP settings, bad sender address). Per-recipient send
    /// failures are reflected in the outcome counts instead.
    pub async fn dispatch(
        &self,
        record: &ApplicationRecord,
    ) -> Result<NotificationOutcome, NotifierError> {
        let recipients = resolve_recipients(&self.config.recipients);
        if recipients.is_empty() {
            tracing::debug!("no notification recipients configured, skipping dispatch");
            return Ok(NotificationOutcome::default());
        }

        let subject = render_subject(record);
        let body = render_body(record);
        if self.config.debug {
            tracing::info!(subject = %subject, "rendered application notification");
        }

        let from = self.sender_address()?;
        let posture = if self.config.smtp_secure {
            TlsPosture::Implicit
        } else {
            TlsPosture::StartTls
        };

        let mut transport = build_transport(&self.config, posture, self.config.smtp_port)?;

        // Proactive verification. A TLS posture mismatch earns exactly one
        // rebuild with the inverse posture; any other failure is logged and
        // the sends proceed on the original transport.
        if let Transport::Smtp(smtp) = &transport {
            let verification = smtp.test_connection().await.map_err(|e| e.to_string());

            if let Some((fallback, port)) =
                fallback_posture(&verification, &self.config.tls_fallback_patterns, posture)
            {
                let error_text = verification.as_ref().err().map_or("", String::as_str);
                tracing::warn!(
                    error = %error_text,
                    ?fallback,
                    port,
                    "TLS posture mismatch, rebuilding transport with inverse posture"
                );
                transport = build_transport(&self.config, fallback, port)?;
            } else {
                match &verification {
                    Ok(true) => {}
                    Ok(false) => tracing::warn!(
                        "SMTP connection verification failed, attempting sends anyway"
                    ),
                    Err(text) => tracing::warn!(
                        error = %text,
                        "SMTP verification failed, attempting sends anyway"
                    ),
                }
            }
        }

        let mut outcome = NotificationOutcome::default();
        for recipient in &recipients {
            match send_one(&transport, &from, recipient, &subject, &body).await {
                Ok(preview) => {
                    outcome.sent += 1;
                    if let Some(preview) = preview {
                        outcome.previews.push(preview);
                    }
                }
                Err(e) => {
                    tracing::warn!(recipient = %recipient, error = %e, "notification send failed");
                    outcome.failed += 1;
                }
            }
        }

        tracing::info!(
            sent = outcome.sent,
            failed = outcome.failed,
            "application notification dispatch complete"
        );
        Ok(outcome)
    }

    fn sender_address(&self) -> Result<String, NotifierError> {
        if self.config.test_mode {
            // The outbox never relays, any syntactically valid sender works.
            return Ok(self
                .config
                .from_address
                .clone()
                .unwrap_or_else(|| "no-reply@crestway.test".to_string()));
        }

        self.config
            .from_address
            .clone()
            .ok_or(NotifierError::Misconfigured("SMTP_FROM"))
    }
}

/// Build a delivery transport for one dispatch.
///
/// Pure with respect to shared state: callers hold the only handle, and the
/// TLS fallback path simply calls this again with a derived posture instead
/// of mutating an existing transport.
fn build_transport(
    config: &EmailConfig,
    posture: TlsPosture,
    port: u16,
) -> Result<Transport, NotifierError> {
    if config.test_mode {
        std::fs::create_dir_all(&config.test_dir)?;
        return Ok(Transport::File {
            inner: AsyncFileTransport::new(&config.test_dir),
            dir: config.test_dir.clone(),
        });
    }

    let host = config
        .smtp_host
        .as_deref()
        .ok_or(NotifierError::Misconfigured("SMTP_HOST"))?;
    let username = config
        .smtp_username
        .as_deref()
        .ok_or(NotifierError::Misconfigured("SMTP_USERNAME"))?;
    let password = config
        .smtp_password
        .as_ref()
        .ok_or(NotifierError::Misconfigured("SMTP_PASSWORD"))?;

    let credentials = Credentials::new(username.to_string(), password.expose_secret().to_string());

    let mut tls_builder = TlsParameters::builder(host.to_string());
    if config.allow_invalid_certs {
        tls_builder = tls_builder.dangerous_accept_invalid_certs(true);
    }
    let tls_parameters = tls_builder.build()?;

    let tls = match posture {
        TlsPosture::Implicit => Tls::Wrapper(tls_parameters),
        TlsPosture::StartTls => Tls::Required(tls_parameters),
    };

    let mailer = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        .port(port)
        .tls(tls)
        .credentials(credentials)
        .build();

    Ok(Transport::Smtp(mailer))
}

/// Attempt a single send, returning a preview link in test mode.
async fn send_one(
    transport: &Transport,
    from: &str,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<Option<String>, SendError> {
    let message = Message::builder()
        .from(from.parse()?)
        .to(to.parse()?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())?;

    match transport {
        Transport::Smtp(mailer) => {
            mailer.send(message).await?;
            Ok(None)
        }
        Transport::File { inner, dir } => {
            let id = inner.send(message).await?;
            Ok(Some(preview_path(dir, &id)))
        }
    }
}

/// Preview link for a message written to the test-mode outbox.
fn preview_path(dir: &Path, id: &str) -> String {
    format!("file://{}", dir.join(format!("{id}.eml")).display())
}

/// Resolve the raw comma-separated recipient list: trimmed, empties
/// dropped, capped at the first three addresses.
fn resolve_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(MAX_RECIPIENTS)
        .map(str::to_string)
        .collect()
}

/// Whether a verification error looks like a TLS posture mismatch.
///
/// Substring matching against a configured pattern set; the wording varies
/// across TLS backends, so the set is overridable rather than hardcoded.
fn is_tls_mismatch(error_text: &str, patterns: &[String]) -> bool {
    let lowered = error_text.to_lowercase();
    patterns.iter().any(|p| lowered.contains(p.as_str()))
}

/// Decide whether a verification outcome earns the one-shot inverse-posture
/// rebuild.
///
/// Only an error whose text matches the mismatch patterns does; a clean
/// verification, a soft `Ok(false)`, and unrelated errors (refused
/// connection, bad credentials) all keep the original transport.
fn fallback_posture(
    verification: &Result<bool, String>,
    patterns: &[String],
    posture: TlsPosture,
) -> Option<(TlsPosture, u16)> {
    match verification {
        Err(text) if is_tls_mismatch(text, patterns) => Some(posture.inverse()),
        _ => None,
    }
}

/// Subject line for the notification message.
fn render_subject(record: &ApplicationRecord) -> String {
    format!(
        "New application: {} - {}",
        record.full_name(),
        record.program
    )
}

/// Plaintext body for the notification message.
///
/// Optional fields are omitted entirely when absent; no placeholder text
/// is ever emitted.
fn render_body(record: &ApplicationRecord) -> String {
    let mut lines = Vec::with_capacity(10);

    lines.push(format!("Name: {}", record.full_name()));
    if let Some(dob) = record.dob {
        lines.push(format!("DOB: {}", dob.format("%-d %B %Y")));
    }
    if let Some(nic) = &record.nic {
        lines.push(format!("NIC: {nic}"));
    }
    if let Some(gender) = record.gender {
        lines.push(format!("Gender: {gender}"));
    }
    lines.push(format!("Email: {}", record.email));
    lines.push(format!("Phone: {}", record.phone));
    if let Some(address) = &record.address {
        lines.push(format!("Address: {address}"));
    }
    lines.push(format!("Program: {}", record.program));
    lines.push(format!("Academy: {}", record.academy));
    lines.push(format!(
        "Submitted: {}",
        record.created_at.format("%-d %B %Y %H:%M UTC")
    ));

    lines.join("\n")
}
