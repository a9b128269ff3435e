//! Database operations for the `communities` table.
//!
//! There is no `updated_at` trigger. Every mutation here runs inside a
//! transaction that ends with [`touch_community_in`].

use chrono::{DateTime, Utc};
use forumdb_core::{normalize_community_name, NewCommunity};
use sqlx::{PgConnection, PgPool};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `communities` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommunityRow {
    pub id: i64,
    pub name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub subscribers: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Get-or-create a community by canonical name.
///
/// A new row takes every field from `community`. An existing row keeps its
/// stored values for fields `community` leaves empty, takes the rest, and
/// is touched. The returned flag is `true` when the row was created.
///
/// # Errors
///
/// Returns [`DbError::Validation`] if the name, display name, or subscriber
/// count is invalid, or [`DbError::Sqlx`] on database failure.
pub async fn upsert_community(
    pool: &PgPool,
    community: &NewCommunity,
) -> Result<(CommunityRow, bool), DbError> {
    let mut tx = pool.begin().await?;
    let result = upsert_community_in(&mut tx, community).await?;
    tx.commit().await?;
    Ok(result)
}

pub(crate) async fn upsert_community_in(
    conn: &mut PgConnection,
    community: &NewCommunity,
) -> Result<(CommunityRow, bool), DbError> {
    let name = community.validate()?;
    let display_name = community.display_name_or_default();

    let created = sqlx::query_as::<_, CommunityRow>(
        "INSERT INTO communities (name, display_name, description, subscribers) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (name) DO NOTHING \
         RETURNING id, name, display_name, description, subscribers, created_at, updated_at",
    )
    .bind(&name)
    .bind(&display_name)
    .bind(community.description.as_deref())
    .bind(community.subscribers)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(row) = created {
        tracing::info!(community_id = row.id, community = %row.name, "community created");
        return Ok((row, true));
    }

    let id: i64 = sqlx::query_scalar(
        "UPDATE communities \
         SET display_name = COALESCE($2, display_name), \
             description  = COALESCE($3, description), \
             subscribers  = COALESCE($4, subscribers) \
         WHERE name = $1 \
         RETURNING id",
    )
    .bind(&name)
    .bind(community.display_name.as_deref())
    .bind(community.description.as_deref())
    .bind(community.subscribers)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("community", &name))?;

    let row = touch_community_in(conn, id).await?;
    Ok((row, false))
}

/// Replaces a community's subscriber count.
///
/// # Errors
///
/// Returns [`DbError::Validation`] for a negative count,
/// [`DbError::NotFound`] if the community does not exist, or
/// [`DbError::Sqlx`] on database failure.
pub async fn update_community_subscribers(
    pool: &PgPool,
    id: i64,
    subscribers: i32,
) -> Result<CommunityRow, DbError> {
    if subscribers < 0 {
        return Err(forumdb_core::CoreError::OutOfRange {
            field: "community subscribers",
            reason: format!("{subscribers} is negative"),
        }
        .into());
    }

    let mut tx = pool.begin().await?;

    let updated = sqlx::query("UPDATE communities SET subscribers = $2 WHERE id = $1")
        .bind(id)
        .bind(subscribers)
        .execute(&mut *tx)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(DbError::not_found("community", id));
    }

    let row = touch_community_in(&mut tx, id).await?;
    tx.commit().await?;
    Ok(row)
}

/// Refreshes `updated_at` on a community without changing anything else.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the community does not exist, or
/// [`DbError::Sqlx`] on database failure.
pub async fn touch_community(pool: &PgPool, id: i64) -> Result<CommunityRow, DbError> {
    let mut conn = pool.acquire().await?;
    touch_community_in(&mut conn, id).await
}

pub(crate) async fn touch_community_in(
    conn: &mut PgConnection,
    id: i64,
) -> Result<CommunityRow, DbError> {
    // clock_timestamp() so a touch in the same transaction as the insert
    // still moves past created_at.
    sqlx::query_as::<_, CommunityRow>(
        "UPDATE communities SET updated_at = clock_timestamp() \
         WHERE id = $1 \
         RETURNING id, name, display_name, description, subscribers, created_at, updated_at",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("community", id))
}

/// Deletes a community and, by cascade, every run and artifact it owns.
///
/// Returns `false` if no community had the given `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn delete_community(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM communities WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    let deleted = result.rows_affected() > 0;
    if deleted {
        tracing::info!(community_id = id, "community deleted");
    }
    Ok(deleted)
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::NotFound`] if no community has the given `id`, or
/// [`DbError::Sqlx`] on database failure.
pub async fn get_community(pool: &PgPool, id: i64) -> Result<CommunityRow, DbError> {
    sqlx::query_as::<_, CommunityRow>(
        "SELECT id, name, display_name, description, subscribers, created_at, updated_at \
         FROM communities \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::not_found("community", id))
}

/// Looks a community up by name. `r/GoLang` and `golang` find the same row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn get_community_by_name(
    pool: &PgPool,
    name: &str,
) -> Result<Option<CommunityRow>, DbError> {
    let name = normalize_community_name(name);

    let row = sqlx::query_as::<_, CommunityRow>(
        "SELECT id, name, display_name, description, subscribers, created_at, updated_at \
         FROM communities \
         WHERE name = $1",
    )
    .bind(&name)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns every community ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn list_communities(pool: &PgPool) -> Result<Vec<CommunityRow>, DbError> {
    let rows = sqlx::query_as::<_, CommunityRow>(
        "SELECT id, name, display_name, description, subscribers, created_at, updated_at \
         FROM communities \
         ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
