//! Database operations for `comments`.
//!
//! Comments are append-only: there is no uniqueness on
//! `(reddit_id, collection_run_id)`, and inserting the same comment twice
//! stores two rows. Callers that need one row per comment run
//! [`forumdb_core::dedupe_comments`] first.

use chrono::{DateTime, Utc};
use forumdb_core::{NewComment, ParentRef};
use sqlx::{PgConnection, PgPool};

use crate::collection_runs::lock_running_run;
use crate::DbError;

// ---- Row types ----

/// A row from the `comments` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub reddit_id: String,
    pub post_id: i64,
    pub collection_run_id: i64,
    pub parent_reddit_id: Option<String>,
    pub parent_comment_id: Option<i64>,
    pub author_name: Option<String>,
    pub body: Option<String>,
    pub score: Option<i32>,
    pub depth: i32,
    pub is_submitter: bool,
    pub created_utc: Option<DateTime<Utc>>,
    pub collected_at: DateTime<Utc>,
}

impl CommentRow {
    /// The parent comment, linked by row id when it was in the same run at
    /// insert time. `None` for a top-level reply.
    #[must_use]
    pub fn parent(&self) -> Option<ParentRef> {
        ParentRef::from_columns(self.parent_comment_id, self.parent_reddit_id.as_deref())
    }
}

// ---- Writes ----

/// Appends one comment to a post within a running run.
///
/// # Errors
///
/// - [`DbError::Validation`] if `comment` breaks a column bound.
/// - [`DbError::NotFound`] if the run or post does not exist.
/// - [`DbError::InvalidCollectionRunTransition`] if the run is closed.
/// - [`DbError::WrongOwner`] if the post was captured by a different run.
/// - [`DbError::Sqlx`] on database failure.
pub async fn insert_comment(
    pool: &PgPool,
    run_id: i64,
    post_id: i64,
    comment: &NewComment,
) -> Result<CommentRow, DbError> {
    comment.validate()?;

    let mut tx = pool.begin().await?;
    lock_running_run(&mut tx, run_id).await?;
    check_post_owner(&mut tx, run_id, post_id).await?;
    let row = insert_comment_in(&mut tx, run_id, post_id, comment).await?;
    tx.commit().await?;

    Ok(row)
}

/// Appends a batch of comments for one post in a single transaction.
///
/// Comments are written in order, so a reply listed after its parent gets a
/// resolved parent link. Nothing is written if any comment is rejected.
///
/// # Errors
///
/// Same as [`insert_comment`].
pub async fn insert_comments(
    pool: &PgPool,
    run_id: i64,
    post_id: i64,
    comments: &[NewComment],
) -> Result<Vec<CommentRow>, DbError> {
    for comment in comments {
        comment.validate()?;
    }

    let mut tx = pool.begin().await?;
    lock_running_run(&mut tx, run_id).await?;
    check_post_owner(&mut tx, run_id, post_id).await?;

    let mut rows = Vec::with_capacity(comments.len());
    for comment in comments {
        rows.push(insert_comment_in(&mut tx, run_id, post_id, comment).await?);
    }
    tx.commit().await?;

    tracing::debug!(run_id, post_id, count = rows.len(), "comments inserted");
    Ok(rows)
}

async fn check_post_owner(
    conn: &mut PgConnection,
    run_id: i64,
    post_id: i64,
) -> Result<(), DbError> {
    let actual =
        sqlx::query_scalar::<_, i64>("SELECT collection_run_id FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("post", post_id))?;

    if actual != run_id {
        return Err(DbError::WrongOwner {
            child: "post",
            child_id: post_id,
            owner: "collection run",
            expected: run_id,
            actual,
        });
    }
    Ok(())
}

async fn insert_comment_in(
    conn: &mut PgConnection,
    run_id: i64,
    post_id: i64,
    comment: &NewComment,
) -> Result<CommentRow, DbError> {
    let parent_comment_id = match comment.parent_reddit_id.as_deref() {
        Some(parent) => resolve_parent(conn, run_id, parent).await?,
        None => None,
    };

    let row = sqlx::query_as::<_, CommentRow>(
        "INSERT INTO comments \
             (reddit_id, post_id, collection_run_id, parent_reddit_id, parent_comment_id, \
              author_name, body, score, depth, is_submitter, created_utc) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING id, reddit_id, post_id, collection_run_id, parent_reddit_id, \
                   parent_comment_id, author_name, body, score, depth, is_submitter, \
                   created_utc, collected_at",
    )
    .bind(&comment.reddit_id)
    .bind(post_id)
    .bind(run_id)
    .bind(comment.parent_reddit_id.as_deref())
    .bind(parent_comment_id)
    .bind(comment.author_name.as_deref())
    .bind(comment.body.as_deref())
    .bind(comment.score)
    .bind(comment.depth)
    .bind(comment.is_submitter)
    .bind(comment.created_utc)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row)
}

/// Earliest comment in the run with the given external id, if any.
async fn resolve_parent(
    conn: &mut PgConnection,
    run_id: i64,
    parent_reddit_id: &str,
) -> Result<Option<i64>, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM comments \
         WHERE collection_run_id = $1 AND reddit_id = $2 \
         ORDER BY id \
         LIMIT 1",
    )
    .bind(run_id)
    .bind(parent_reddit_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(id)
}

// ---- Reads ----

/// Comments on one post, highest score first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn list_comments_for_post(
    pool: &PgPool,
    post_id: i64,
) -> Result<Vec<CommentRow>, DbError> {
    let rows = sqlx::query_as::<_, CommentRow>(
        "SELECT id, reddit_id, post_id, collection_run_id, parent_reddit_id, parent_comment_id, \
                author_name, body, score, depth, is_submitter, created_utc, collected_at \
         FROM comments \
         WHERE post_id = $1 \
         ORDER BY score DESC NULLS LAST, id",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Comments captured by one run, highest score first. `None` returns them all.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn list_comments_for_run(
    pool: &PgPool,
    run_id: i64,
    limit: Option<i64>,
) -> Result<Vec<CommentRow>, DbError> {
    let rows = sqlx::query_as::<_, CommentRow>(
        "SELECT id, reddit_id, post_id, collection_run_id, parent_reddit_id, parent_comment_id, \
                author_name, body, score, depth, is_submitter, created_utc, collected_at \
         FROM comments \
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

/// Replies written by the post's own author within one run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn list_op_comments(pool: &PgPool, run_id: i64) -> Result<Vec<CommentRow>, DbError> {
    let rows = sqlx::query_as::<_, CommentRow>(
        "SELECT id, reddit_id, post_id, collection_run_id, parent_reddit_id, parent_comment_id, \
                author_name, body, score, depth, is_submitter, created_utc, collected_at \
         FROM comments \
         WHERE collection_run_id = $1 AND is_submitter \
         ORDER BY score DESC NULLS LAST, id",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Number of comment rows stored for a run, duplicates included.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn count_comments_for_run(pool: &PgPool, run_id: i64) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM comments WHERE collection_run_id = $1",
    )
    .bind(run_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
