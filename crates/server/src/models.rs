//! Domain models for the admissions backend.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crestway_core::{Email, Phone};

/// Applicant gender as captured on the admission form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    /// String form used for persistence and rendering.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male" => Ok(Self::Male),
            "Female" => Ok(Self::Female),
            "Other" => Ok(Self::Other),
            other => Err(format!("unknown gender value: {other}")),
        }
    }
}

/// A submitted admission application.
///
/// Created once via the public form, read and deleted by the admin; never
/// updated in place except for the `processed` flag.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub dob: Option<NaiveDate>,
    pub nic: Option<String>,
    pub gender: Option<Gender>,
    pub email: Email,
    pub phone: Phone,
    pub whatsapp: Option<String>,
    pub address: Option<String>,
    pub school: Option<String>,
    pub ol_year: Option<String>,
    pub ol_results: Option<String>,
    pub parent_name: Option<String>,
    pub parent_phone: Option<String>,
    pub program: String,
    pub academy: String,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

impl ApplicationRecord {
    /// Applicant's full name, as rendered in notifications.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A validated application ready to be persisted.
///
/// The store assigns the id and creation timestamp.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub first_name: String,
    pub last_name: String,
    pub dob: Option<NaiveDate>,
    pub nic: Option<String>,
    pub gender: Option<Gender>,
    pub email: Email,
    pub phone: Phone,
    pub whatsapp: Option<String>,
    pub address: Option<String>,
    pub school: Option<String>,
    pub ol_year: Option<String>,
    pub ol_results: Option<String>,
    pub parent_name: Option<String>,
    pub parent_phone: Option<String>,
    pub program: String,
    pub academy: String,
}

/// Identity of the authenticated admin, derived from credentials at login
/// or from a verified bearer token on protected requests.
#[derive(Debug, Clone, Serialize)]
pub struct AdminIdentity {
    pub name: String,
    pub email: String,
    pub role: String,
}

impl AdminIdentity {
    /// The only role this backend issues.
    pub const ROLE: &'static str = "admin";

    /// Identity for the single operator account.
    #[must_use]
    pub fn admin(email: impl Into<String>) -> Self {
        Self {
            name: "Admin".to_string(),
            email: email.into(),
            role: Self::ROLE.to_string(),
        }
    }
}

/// Aggregated outcome of one notification dispatch.
///
/// Invariant: `sent + failed` equals the number of recipients actually
/// attempted (0 when none are configured).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotificationOutcome {
    pub sent: u32,
    pub failed: u32,
    pub previews: Vec<String>,
}

impl NotificationOutcome {
    /// Outcome reflecting total failure across `count` recipients, used when
    /// transport construction itself fails.
    #[must_use]
    pub fn all_failed(count: u32) -> Self {
        Self {
            sent: 0,
            failed: count,
            previews: Vec::new(),
        }
    }
}
