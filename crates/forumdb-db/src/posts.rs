//! Database operations for `posts`.
//!
//! A post is unique per `(reddit_id, collection_run_id)`. The same
//! submission captured by two runs is two rows, one per run.

use chrono::{DateTime, Utc};
use forumdb_core::NewPost;
use sqlx::{PgConnection, PgPool};

use crate::collection_runs::lock_running_run;
use crate::{is_foreign_key_violation, is_unique_violation, DbError};

// ---- Row types ----

/// A row from the `posts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub id: i64,
    pub reddit_id: String,
    pub collection_run_id: i64,
    pub community_id: i64,
    pub title: String,
    pub selftext: Option<String>,
    pub author_name: Option<String>,
    pub score: Option<i32>,
    pub upvote_ratio: Option<f64>,
    pub num_comments: Option<i32>,
    pub flair_text: Option<String>,
    pub is_self: bool,
    pub is_video: bool,
    pub permalink: Option<String>,
    pub created_utc: Option<DateTime<Utc>>,
    pub collected_at: DateTime<Utc>,
}

/// Outcome of [`upsert_post`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct PostUpsert {
    pub id: i64,
    /// `false` when an existing row for the same run was overwritten.
    pub inserted: bool,
}

// ---- Writes ----

/// Insert-or-refresh a post within a running run.
///
/// When `(post.reddit_id, run_id)` already exists, only the fields that move
/// between fetches are overwritten: score, comment count, upvote ratio, and
/// flair. The row keeps its id, so repeating the call after a partial
/// failure is safe.
///
/// # Errors
///
/// - [`DbError::Validation`] if `post` breaks a column bound.
/// - [`DbError::NotFound`] if the run does not exist.
/// - [`DbError::InvalidCollectionRunTransition`] if the run is closed.
/// - [`DbError::WrongOwner`] if the run belongs to a different community.
/// - [`DbError::Sqlx`] on database failure.
pub async fn upsert_post(
    pool: &PgPool,
    run_id: i64,
    community_id: i64,
    post: &NewPost,
) -> Result<PostUpsert, DbError> {
    post.validate()?;

    let mut tx = pool.begin().await?;
    check_run_owner(&mut tx, run_id, community_id).await?;

    let upsert = sqlx::query_as::<_, PostUpsert>(
        "INSERT INTO posts \
             (reddit_id, collection_run_id, community_id, title, selftext, author_name, \
              score, upvote_ratio, num_comments, flair_text, is_self, is_video, permalink, \
              created_utc) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         ON CONFLICT (reddit_id, collection_run_id) DO UPDATE \
             SET score        = EXCLUDED.score, \
                 num_comments = EXCLUDED.num_comments, \
                 upvote_ratio = EXCLUDED.upvote_ratio, \
                 flair_text   = EXCLUDED.flair_text \
         RETURNING id, (xmax = 0) AS inserted",
    )
    .bind(&post.reddit_id)
    .bind(run_id)
    .bind(community_id)
    .bind(&post.title)
    .bind(post.selftext.as_deref())
    .bind(post.author_name.as_deref())
    .bind(post.score)
    .bind(post.upvote_ratio)
    .bind(post.num_comments)
    .bind(post.flair_text.as_deref())
    .bind(post.is_self)
    .bind(post.is_video)
    .bind(post.permalink.as_deref())
    .bind(post.created_utc)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(
        run_id,
        post_id = upsert.id,
        reddit_id = %post.reddit_id,
        inserted = upsert.inserted,
        "post upserted"
    );
    Ok(upsert)
}

/// Strict create: a post already captured by this run is a conflict.
///
/// # Errors
///
/// Same as [`upsert_post`], plus [`DbError::Conflict`] when
/// `(post.reddit_id, run_id)` already exists.
pub async fn insert_post(
    pool: &PgPool,
    run_id: i64,
    community_id: i64,
    post: &NewPost,
) -> Result<i64, DbError> {
    post.validate()?;

    let mut tx = pool.begin().await?;
    check_run_owner(&mut tx, run_id, community_id).await?;

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO posts \
             (reddit_id, collection_run_id, community_id, title, selftext, author_name, \
              score, upvote_ratio, num_comments, flair_text, is_self, is_video, permalink, \
              created_utc) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         RETURNING id",
    )
    .bind(&post.reddit_id)
    .bind(run_id)
    .bind(community_id)
    .bind(&post.title)
    .bind(post.selftext.as_deref())
    .bind(post.author_name.as_deref())
    .bind(post.score)
    .bind(post.upvote_ratio)
    .bind(post.num_comments)
    .bind(post.flair_text.as_deref())
    .bind(post.is_self)
    .bind(post.is_video)
    .bind(post.permalink.as_deref())
    .bind(post.created_utc)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            DbError::Conflict(format!(
                "post {} already captured by collection run {run_id}",
                post.reddit_id
            ))
        } else if is_foreign_key_violation(&e) {
            DbError::not_found("community", community_id)
        } else {
            DbError::Sqlx(e)
        }
    })?;

    tx.commit().await?;
    Ok(id)
}

/// Locks the run for the rest of the transaction and checks it is running
/// and owned by `community_id`.
async fn check_run_owner(
    conn: &mut PgConnection,
    run_id: i64,
    community_id: i64,
) -> Result<(), DbError> {
    let actual = lock_running_run(conn, run_id).await?;
    if actual != community_id {
        return Err(DbError::WrongOwner {
            child: "collection run",
            child_id: run_id,
            owner: "community",
            expected: community_id,
            actual,
        });
    }
    Ok(())
}

// ---- Reads ----

/// # Errors
///
/// Returns [`DbError::NotFound`] if no post has the given `id`, or
/// [`DbError::Sqlx`] on database failure.
pub async fn get_post(pool: &PgPool, id: i64) -> Result<PostRow, DbError> {
    sqlx::query_as::<_, PostRow>(
        "SELECT id, reddit_id, collection_run_id, community_id, title, selftext, author_name, \
                score, upvote_ratio, num_comments, flair_text, is_self, is_video, permalink, \
                created_utc, collected_at \
         FROM posts \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::not_found("post", id))
}

/// Finds the row a run stored for one external post id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn get_post_by_reddit_id(
    pool: &PgPool,
    run_id: i64,
    reddit_id: &str,
) -> Result<Option<PostRow>, DbError> {
    let row = sqlx::query_as::<_, PostRow>(
        "SELECT id, reddit_id, collection_run_id, community_id, title, selftext, author_name, \
                score, upvote_ratio, num_comments, flair_text, is_self, is_video, permalink, \
                created_utc, collected_at \
         FROM posts \
         WHERE collection_run_id = $1 AND reddit_id = $2",
    )
    .bind(run_id)
    .bind(reddit_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Posts captured by one run, highest score first. `None` returns them all.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn list_posts_for_run(
    pool: &PgPool,
    run_id: i64,
    limit: Option<i64>,
) -> Result<Vec<PostRow>, DbError> {
    let rows = sqlx::query_as::<_, PostRow>(
        "SELECT id, reddit_id, collection_run_id, community_id, title, selftext, author_name, \
                score, upvote_ratio, num_comments, flair_text, is_self, is_video, permalink, \
                created_utc, collected_at \
         FROM posts \
         WHERE collection_run_id = $1 \
         ORDER BY score DESC NULLS LAST, id \
         LIMIT $2",
    )
    .bind(run_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Posts captured for a community across all of its runs, highest score
/// first. `None` returns them all.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn list_posts_for_community(
    pool: &PgPool,
    community_id: i64,
    limit: Option<i64>,
) -> Result<Vec<PostRow>, DbError> {
    let rows = sqlx::query_as::<_, PostRow>(
        "SELECT id, reddit_id, collection_run_id, community_id, title, selftext, author_name, \
                score, upvote_ratio, num_comments, flair_text, is_self, is_video, permalink, \
                created_utc, collected_at \
         FROM posts \
         WHERE community_id = $1 \
         ORDER BY score DESC NULLS LAST, id \
         LIMIT $2",
    )
    .bind(community_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn count_posts_for_run(pool: &PgPool, run_id: i64) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM posts WHERE collection_run_id = $1",
    )
    .bind(run_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
