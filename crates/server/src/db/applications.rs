//! Application repository.
//!
//! The admissions form is the only writer; the admin dashboard reads,
//! marks processed, and deletes.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crestway_core::{Email, Phone};

use super::RepositoryError;
use crate::models::{ApplicationRecord, Gender, NewApplication};

/// Persistence seam for admission applications.
///
/// Handlers depend only on this trait; the concrete store is injected at
/// startup. Listing is always newest-first.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Persist a new application, assigning its id and creation timestamp.
    async fn create(&self, new: NewApplication) -> Result<ApplicationRecord, RepositoryError>;

    /// List all applications, newest first.
    async fn find(&self) -> Result<Vec<ApplicationRecord>, RepositoryError>;

    /// Fetch one application by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApplicationRecord>, RepositoryError>;

    /// Mark an application as processed.
    ///
    /// Returns `RepositoryError::NotFound` if no such application exists.
    async fn mark_processed(&self, id: Uuid) -> Result<ApplicationRecord, RepositoryError>;

    /// Delete an application.
    ///
    /// Returns `RepositoryError::NotFound` if no such application exists.
    async fn delete_by_id(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// Total number of applications.
    async fn count_total(&self) -> Result<i64, RepositoryError>;

    /// Number of applications not yet processed.
    async fn count_unprocessed(&self) -> Result<i64, RepositoryError>;

    /// Health check against the underlying store.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

// =============================================================================
// Internal Row Type
// =============================================================================

/// Internal row type for `PostgreSQL` application queries.
#[derive(Debug, sqlx::FromRow)]
struct ApplicationRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    dob: Option<NaiveDate>,
    nic: Option<String>,
    gender: Option<String>,
    email: Email,
    phone: Phone,
    whatsapp: Option<String>,
    address: Option<String>,
    school: Option<String>,
    ol_year: Option<String>,
    ol_results: Option<String>,
    parent_name: Option<String>,
    parent_phone: Option<String>,
    program: String,
    academy: String,
    processed: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ApplicationRow> for ApplicationRecord {
    type Error = RepositoryError;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        let gender = row
            .gender
            .map(|g| {
                g.parse::<Gender>().map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid gender in database: {e}"))
                })
            })
            .transpose()?;

        Ok(Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            dob: row.dob,
            nic: row.nic,
            gender,
            email: row.email,
            phone: row.phone,
            whatsapp: row.whatsapp,
            address: row.address,
            school: row.school,
            ol_year: row.ol_year,
            ol_results: row.ol_results,
            parent_name: row.parent_name,
            parent_phone: row.parent_phone,
            program: row.program,
            academy: row.academy,
            processed: row.processed,
            created_at: row.created_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, first_name, last_name, dob, nic, gender, email, phone, \
     whatsapp, address, school, ol_year, ol_results, parent_name, parent_phone, \
     program, academy, processed, created_at";

// =============================================================================
// Repository
// =============================================================================

/// `PostgreSQL`-backed [`ApplicationStore`].
#[derive(Clone)]
pub struct PgApplicationStore {
    pool: PgPool,
}

impl PgApplicationStore {
    /// Create a new application store over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationStore for PgApplicationStore {
    async fn create(&self, new: NewApplication) -> Result<ApplicationRecord, RepositoryError> {
        let query = format!(
            "INSERT INTO application \
             (id, first_name, last_name, dob, nic, gender, email, phone, whatsapp, \
              address, school, ol_year, ol_results, parent_name, parent_phone, \
              program, academy, processed, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
                     $16, $17, FALSE, NOW()) \
             RETURNING {SELECT_COLUMNS}"
        );

        let row = sqlx::query_as::<_, ApplicationRow>(&query)
            .bind(Uuid::new_v4())
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(new.dob)
            .bind(&new.nic)
            .bind(new.gender.map(Gender::as_str))
            .bind(&new.email)
            .bind(&new.phone)
            .bind(&new.whatsapp)
            .bind(&new.address)
            .bind(&new.school)
            .bind(&new.ol_year)
            .bind(&new.ol_results)
            .bind(&new.parent_name)
            .bind(&new.parent_phone)
            .bind(&new.program)
            .bind(&new.academy)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    async fn find(&self) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let query =
            format!("SELECT {SELECT_COLUMNS} FROM application ORDER BY created_at DESC");

        let rows = sqlx::query_as::<_, ApplicationRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM application WHERE id = $1");

        let row = sqlx::query_as::<_, ApplicationRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn mark_processed(&self, id: Uuid) -> Result<ApplicationRecord, RepositoryError> {
        let query = format!(
            "UPDATE application SET processed = TRUE WHERE id = $1 RETURNING {SELECT_COLUMNS}"
        );

        let row = sqlx::query_as::<_, ApplicationRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM application WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn count_total(&self) -> Result<i64, RepositoryError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM application")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    async fn count_unprocessed(&self) -> Result<i64, RepositoryError> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM application WHERE processed = FALSE")
                .fetch_one(&self.pool)
                .await?;

        Ok(count.0)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
