//! Database operations for `upload_runs`.
//!
//! A run moves `queued -> running -> succeeded | failed`; each transition is
//! guarded in SQL so a run can only leave the status it is expected to be in.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// Who started an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Cli,
    Scheduler,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerSource::Cli => "cli",
            TriggerSource::Scheduler => "scheduler",
        }
    }
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row from the `upload_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UploadRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub trigger_source: String,
    pub source_file: Option<String>,
    pub status: String,
    pub lines_received: i32,
    pub lines_dropped: i32,
    pub records_written: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Counters recorded when a run succeeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub lines_received: i32,
    pub lines_dropped: i32,
    /// Master plus detail rows inserted or updated.
    pub records_written: i32,
}

const RUN_COLUMNS: &str = "id, public_id, trigger_source, source_file, status, \
     lines_received, lines_dropped, records_written, \
     started_at, completed_at, error_message, created_at";

/// Creates a new upload run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_upload_run(
    pool: &PgPool,
    trigger_source: TriggerSource,
    source_file: Option<&str>,
) -> Result<UploadRunRow, DbError> {
    let row = sqlx::query_as::<_, UploadRunRow>(&format!(
        "INSERT INTO upload_runs (public_id, trigger_source, source_file, status) \
         VALUES ($1, $2, $3, 'queued') \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(trigger_source.as_str())
    .bind(source_file)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidUploadRunTransition`] if the run is not
/// `queued`, or [`DbError::Sqlx`] if the update fails.
pub async fn start_upload_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE upload_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidUploadRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a run as `succeeded` and records its counters.
///
/// # Errors
///
/// Returns [`DbError::InvalidUploadRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_upload_run(pool: &PgPool, id: i64, counts: RunCounts) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE upload_runs \
         SET status = 'succeeded', completed_at = NOW(), \
             lines_received = $1, lines_dropped = $2, records_written = $3 \
         WHERE id = $4 AND status = 'running'",
    )
    .bind(counts.lines_received)
    .bind(counts.lines_dropped)
    .bind(counts.records_written)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidUploadRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run as `failed`, sets `completed_at = NOW()` and `error_message`.
///
/// # Errors
///
/// Returns [`DbError::InvalidUploadRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_upload_run(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE upload_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidUploadRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_upload_run(pool: &PgPool, id: i64) -> Result<UploadRunRow, DbError> {
    sqlx::query_as::<_, UploadRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM upload_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_upload_runs(pool: &PgPool, limit: i64) -> Result<Vec<UploadRunRow>, DbError> {
    let rows = sqlx::query_as::<_, UploadRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM upload_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
