//! Database operations for `authors`.
//!
//! Author snapshots are independent of runs: one row per username,
//! refreshed in place on every fetch.

use chrono::{DateTime, Utc};
use forumdb_core::AuthorProfile;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `authors` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthorRow {
    pub id: i64,
    pub username: String,
    pub link_karma: Option<i32>,
    pub comment_karma: Option<i32>,
    pub total_karma: Option<i32>,
    pub account_created_utc: Option<DateTime<Utc>>,
    pub is_gold: bool,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct AuthorUpsert {
    pub id: i64,
    pub inserted: bool,
}

/// Insert-or-refresh an author by username.
///
/// A refresh overwrites the karma fields the new profile carries and keeps
/// stored values for the ones it omits. Without an explicit total,
/// `total_karma` is recomputed from the resulting link and comment karma.
/// `is_gold` only latches on, and `fetched_at` always moves to now.
///
/// # Errors
///
/// Returns [`DbError::Validation`] for an empty or over-long username, or
/// [`DbError::Sqlx`] on database failure.
pub async fn upsert_author(pool: &PgPool, profile: &AuthorProfile) -> Result<AuthorUpsert, DbError> {
    profile.validate()?;

    let upsert = sqlx::query_as::<_, AuthorUpsert>(
        "INSERT INTO authors \
             (username, link_karma, comment_karma, total_karma, account_created_utc, is_gold) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (username) DO UPDATE \
             SET link_karma          = COALESCE(EXCLUDED.link_karma, authors.link_karma), \
                 comment_karma       = COALESCE(EXCLUDED.comment_karma, authors.comment_karma), \
                 total_karma         = COALESCE( \
                     EXCLUDED.total_karma, \
                     GREATEST(LEAST( \
                         COALESCE(EXCLUDED.link_karma, authors.link_karma)::BIGINT \
                             + COALESCE(EXCLUDED.comment_karma, authors.comment_karma)::BIGINT, \
                         2147483647), -2147483648)::INTEGER, \
                     authors.total_karma), \
                 account_created_utc = COALESCE(EXCLUDED.account_created_utc, \
                                                authors.account_created_utc), \
                 is_gold             = authors.is_gold OR EXCLUDED.is_gold, \
                 fetched_at          = NOW() \
         RETURNING id, (xmax = 0) AS inserted",
    )
    .bind(&profile.username)
    .bind(profile.link_karma)
    .bind(profile.comment_karma)
    .bind(profile.effective_total_karma())
    .bind(profile.account_created_utc)
    .bind(profile.is_gold)
    .fetch_one(pool)
    .await?;

    tracing::debug!(
        username = %profile.username,
        inserted = upsert.inserted,
        "author upserted"
    );
    Ok(upsert)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn get_author_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<AuthorRow>, DbError> {
    let row = sqlx::query_as::<_, AuthorRow>(
        "SELECT id, username, link_karma, comment_karma, total_karma, account_created_utc, \
                is_gold, fetched_at \
         FROM authors \
         WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// All authors, highest total karma first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn list_authors(pool: &PgPool, limit: Option<i64>) -> Result<Vec<AuthorRow>, DbError> {
    let rows = sqlx::query_as::<_, AuthorRow>(
        "SELECT id, username, link_karma, comment_karma, total_karma, account_created_utc, \
                is_gold, fetched_at \
         FROM authors \
         ORDER BY total_karma DESC NULLS LAST, username \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Authors whose total karma lies in `min..=max`. Either bound may be open.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn list_authors_by_karma(
    pool: &PgPool,
    min: Option<i32>,
    max: Option<i32>,
) -> Result<Vec<AuthorRow>, DbError> {
    let rows = sqlx::query_as::<_, AuthorRow>(
        "SELECT id, username, link_karma, comment_karma, total_karma, account_created_utc, \
                is_gold, fetched_at \
         FROM authors \
         WHERE total_karma IS NOT NULL \
           AND ($1::INTEGER IS NULL OR total_karma >= $1) \
           AND ($2::INTEGER IS NULL OR total_karma <= $2) \
         ORDER BY total_karma DESC, username",
    )
    .bind(min)
    .bind(max)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
