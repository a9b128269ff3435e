//! Database operations for `reports`: append-only text artifacts per run.

use chrono::{DateTime, Utc};
use forumdb_core::CoreError;
use serde_json::Value;
use sqlx::PgPool;

use crate::{is_foreign_key_violation, DbError};

const MAX_REPORT_TYPE_LEN: usize = 50;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReportRow {
    pub id: i64,
    pub collection_run_id: i64,
    pub report_type: String,
    pub content: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// Appends a report to a run. Any number of reports, of any type, may be
/// attached to the same run.
///
/// `metadata` of `None` is stored as `{}`.
///
/// # Errors
///
/// Returns [`DbError::Validation`] for an empty or over-long report type,
/// [`DbError::NotFound`] if the run does not exist, or [`DbError::Sqlx`]
/// on database failure.
pub async fn add_report(
    pool: &PgPool,
    run_id: i64,
    report_type: &str,
    content: &str,
    metadata: Option<&Value>,
) -> Result<ReportRow, DbError> {
    if report_type.trim().is_empty() {
        return Err(CoreError::Empty {
            field: "report_type",
        }
        .into());
    }
    let actual = report_type.chars().count();
    if actual > MAX_REPORT_TYPE_LEN {
        return Err(CoreError::TooLong {
            field: "report_type",
            max: MAX_REPORT_TYPE_LEN,
            actual,
        }
        .into());
    }

    let row = sqlx::query_as::<_, ReportRow>(
        "INSERT INTO reports (collection_run_id, report_type, content, metadata) \
         VALUES ($1, $2, $3, COALESCE($4, '{}'::jsonb)) \
         RETURNING id, collection_run_id, report_type, content, metadata, created_at",
    )
    .bind(run_id)
    .bind(report_type)
    .bind(content)
    .bind(metadata)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_foreign_key_violation(&e) {
            DbError::not_found("collection run", run_id)
        } else {
            DbError::Sqlx(e)
        }
    })?;

    tracing::info!(run_id, report_id = row.id, report_type, "report added");
    Ok(row)
}

/// Reports for a run, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn list_reports(pool: &PgPool, run_id: i64) -> Result<Vec<ReportRow>, DbError> {
    let rows = sqlx::query_as::<_, ReportRow>(
        "SELECT id, collection_run_id, report_type, content, metadata, created_at \
         FROM reports \
         WHERE collection_run_id = $1 \
         ORDER BY created_at DESC, id DESC",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// The most recent report of one type for a run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn get_latest_report(
    pool: &PgPool,
    run_id: i64,
    report_type: &str,
) -> Result<Option<ReportRow>, DbError> {
    let row = sqlx::query_as::<_, ReportRow>(
        "SELECT id, collection_run_id, report_type, content, metadata, created_at \
         FROM reports \
         WHERE collection_run_id = $1 AND report_type = $2 \
         ORDER BY created_at DESC, id DESC \
         LIMIT 1",
    )
    .bind(run_id)
    .bind(report_type)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
