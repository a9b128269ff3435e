//! Database operations for `collection_runs`.
//!
//! A run is opened `running` and closed exactly once. Every transition is a
//! conditional `UPDATE ... WHERE status = 'running'`, so when two closers
//! race, exactly one sees a row come back and the other gets
//! [`DbError::InvalidCollectionRunTransition`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use forumdb_core::{CoreError, RunStatus};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `collection_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectionRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub community_id: i64,
    /// One of `running`, `completed`, `failed`; see [`CollectionRunRow::run_status`].
    pub status: String,
    pub started_at: DateTime<Utc>,
    /// Set exactly when the run reaches a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Refreshed by [`record_progress`]; drives [`sweep_stale_runs`].
    pub last_activity_at: DateTime<Utc>,
    pub posts_collected: i32,
    pub comments_collected: i32,
    pub error_message: Option<String>,
}

impl CollectionRunRow {
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRunStatus`] if the stored status is not
    /// one the lifecycle knows about.
    pub fn run_status(&self) -> Result<RunStatus, CoreError> {
        self.status.parse()
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Opens a new run for a community in `running` status with zeroed counters.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the community does not exist, or
/// [`DbError::Sqlx`] if the insert fails.
pub async fn begin_run(pool: &PgPool, community_id: i64) -> Result<CollectionRunRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, CollectionRunRow>(
        "INSERT INTO collection_runs (public_id, community_id, status) \
         SELECT $1, c.id, 'running' FROM communities c WHERE c.id = $2 \
         RETURNING id, public_id, community_id, status, started_at, completed_at, \
                   last_activity_at, posts_collected, comments_collected, error_message",
    )
    .bind(public_id)
    .bind(community_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::not_found("community", community_id))?;

    tracing::info!(run_id = row.id, community_id, "collection run started");
    Ok(row)
}

/// Adds to a running run's counters and refreshes `last_activity_at`.
///
/// Counters only grow: negative deltas are rejected before touching the row.
///
/// # Errors
///
/// Returns [`DbError::Validation`] for a negative delta,
/// [`DbError::NotFound`] if the run does not exist,
/// [`DbError::InvalidCollectionRunTransition`] if it is no longer running,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn record_progress(
    pool: &PgPool,
    id: i64,
    posts_delta: i32,
    comments_delta: i32,
) -> Result<CollectionRunRow, DbError> {
    for (field, delta) in [("posts_delta", posts_delta), ("comments_delta", comments_delta)] {
        if delta < 0 {
            return Err(CoreError::OutOfRange {
                field,
                reason: format!("{delta} is negative; run counters only grow"),
            }
            .into());
        }
    }

    let row = sqlx::query_as::<_, CollectionRunRow>(
        "UPDATE collection_runs \
         SET posts_collected = posts_collected + $2, \
             comments_collected = comments_collected + $3, \
             last_activity_at = NOW() \
         WHERE id = $1 AND status = 'running' \
         RETURNING id, public_id, community_id, status, started_at, completed_at, \
                   last_activity_at, posts_collected, comments_collected, error_message",
    )
    .bind(id)
    .bind(posts_delta)
    .bind(comments_delta)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(row),
        None => Err(transition_error(pool, id).await),
    }
}

/// Marks a run as `completed` and sets `completed_at = NOW()`.
///
/// Returns the closed row so callers can read the final counters.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the run does not exist,
/// [`DbError::InvalidCollectionRunTransition`] if it is already terminal,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn complete_run(pool: &PgPool, id: i64) -> Result<CollectionRunRow, DbError> {
    let row = sqlx::query_as::<_, CollectionRunRow>(
        "UPDATE collection_runs \
         SET status = 'completed', completed_at = NOW() \
         WHERE id = $1 AND status = 'running' \
         RETURNING id, public_id, community_id, status, started_at, completed_at, \
                   last_activity_at, posts_collected, comments_collected, error_message",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            tracing::info!(
                run_id = id,
                posts = row.posts_collected,
                comments = row.comments_collected,
                "collection run completed"
            );
            Ok(row)
        }
        None => Err(transition_error(pool, id).await),
    }
}

/// Marks a run as `failed`, sets `completed_at = NOW()`, and stores
/// `error_message` verbatim.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the run does not exist,
/// [`DbError::InvalidCollectionRunTransition`] if it is already terminal,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn fail_run(
    pool: &PgPool,
    id: i64,
    error_message: &str,
) -> Result<CollectionRunRow, DbError> {
    let row = sqlx::query_as::<_, CollectionRunRow>(
        "UPDATE collection_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $2 \
         WHERE id = $1 AND status = 'running' \
         RETURNING id, public_id, community_id, status, started_at, completed_at, \
                   last_activity_at, posts_collected, comments_collected, error_message",
    )
    .bind(id)
    .bind(error_message)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            tracing::warn!(run_id = id, error = error_message, "collection run failed");
            Ok(row)
        }
        None => Err(transition_error(pool, id).await),
    }
}

/// Fails every `running` run whose last activity is older than `older_than`.
///
/// Uses the same conditional update as [`fail_run`], so a run that a worker
/// closes concurrently is never overwritten. Returns the swept rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn sweep_stale_runs(
    pool: &PgPool,
    older_than: Duration,
) -> Result<Vec<CollectionRunRow>, DbError> {
    let minutes = older_than.as_secs() / 60;
    let message = format!("stale: no activity for {minutes} minutes");

    let rows = sqlx::query_as::<_, CollectionRunRow>(
        "UPDATE collection_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE status = 'running' \
           AND last_activity_at < NOW() - make_interval(secs => $2) \
         RETURNING id, public_id, community_id, status, started_at, completed_at, \
                   last_activity_at, posts_collected, comments_collected, error_message",
    )
    .bind(&message)
    .bind(older_than.as_secs_f64())
    .fetch_all(pool)
    .await?;

    for row in &rows {
        tracing::warn!(
            run_id = row.id,
            community_id = row.community_id,
            last_activity_at = %row.last_activity_at,
            "swept stale collection run"
        );
    }

    Ok(rows)
}

/// Takes a shared lock on a run row and checks that it is still `running`.
///
/// Content writers call this first inside their transaction. Closing a run
/// updates the same row, so a close waits for in-flight writers and any
/// writer arriving after the close sees the terminal status.
///
/// Returns the run's `community_id`.
pub(crate) async fn lock_running_run(conn: &mut PgConnection, id: i64) -> Result<i64, DbError> {
    let row: Option<(i64, String)> = sqlx::query_as(
        "SELECT community_id, status FROM collection_runs WHERE id = $1 FOR SHARE",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let (community_id, status) = row.ok_or_else(|| DbError::not_found("collection run", id))?;
    if status.parse::<RunStatus>()?.is_terminal() {
        return Err(DbError::InvalidCollectionRunTransition {
            id,
            expected_status: RunStatus::Running.as_str(),
        });
    }
    Ok(community_id)
}

/// Explains why a conditional transition matched no row.
async fn transition_error(pool: &PgPool, id: i64) -> DbError {
    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM collection_runs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await;

    match exists {
        Ok(Some(_)) => DbError::InvalidCollectionRunTransition {
            id,
            expected_status: "running",
        },
        Ok(None) => DbError::not_found("collection run", id),
        Err(e) => DbError::Sqlx(e),
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_collection_run(pool: &PgPool, id: i64) -> Result<CollectionRunRow, DbError> {
    let row = sqlx::query_as::<_, CollectionRunRow>(
        "SELECT id, public_id, community_id, status, started_at, completed_at, \
                last_activity_at, posts_collected, comments_collected, error_message \
         FROM collection_runs \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::not_found("collection run", id))?;

    Ok(row)
}

/// Returns the most recently started run for a community, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_latest_collection_run(
    pool: &PgPool,
    community_id: i64,
) -> Result<Option<CollectionRunRow>, DbError> {
    let row = sqlx::query_as::<_, CollectionRunRow>(
        "SELECT id, public_id, community_id, status, started_at, completed_at, \
                last_activity_at, posts_collected, comments_collected, error_message \
         FROM collection_runs \
         WHERE community_id = $1 \
         ORDER BY started_at DESC, id DESC \
         LIMIT 1",
    )
    .bind(community_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the most recent `limit` runs for a community, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_collection_runs(
    pool: &PgPool,
    community_id: i64,
    limit: i64,
) -> Result<Vec<CollectionRunRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectionRunRow>(
        "SELECT id, public_id, community_id, status, started_at, completed_at, \
                last_activity_at, posts_collected, comments_collected, error_message \
         FROM collection_runs \
         WHERE community_id = $1 \
         ORDER BY started_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(community_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns every run still in `running` status, oldest activity first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_running_runs(pool: &PgPool) -> Result<Vec<CollectionRunRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectionRunRow>(
        "SELECT id, public_id, community_id, status, started_at, completed_at, \
                last_activity_at, posts_collected, comments_collected, error_message \
         FROM collection_runs \
         WHERE status = 'running' \
         ORDER BY last_activity_at, id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
