//! Aggregate queries over one run's content, the inputs to the statistical
//! analysis documents.

use forumdb_core::stats::round2;
use forumdb_core::ScoreDistribution;
use serde::Serialize;
use sqlx::PgPool;

use crate::DbError;

// ---- Row types ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct FlairCount {
    pub flair: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct AuthorScoreStats {
    pub author_name: String,
    pub count: i64,
    pub total_score: i64,
    pub avg_score: f64,
}

/// How often post authors reply in their own threads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpEngagement {
    pub total_posts: i64,
    pub posts_with_comments: i64,
    pub posts_with_op_replies: i64,
    /// Share of commented posts with at least one OP reply, as a percentage
    /// rounded to two places.
    pub engagement_rate: f64,
    pub op_comment_count: i64,
    pub avg_op_comment_score: f64,
}

#[derive(sqlx::FromRow)]
struct OpEngagementCounts {
    total_posts: i64,
    posts_with_comments: i64,
    posts_with_op_replies: i64,
    op_comment_count: i64,
    avg_op_comment_score: Option<f64>,
}

// ---- Queries ----

/// Score summary over a run's posts. A missing score counts as `0`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn score_distribution(pool: &PgPool, run_id: i64) -> Result<ScoreDistribution, DbError> {
    let scores = sqlx::query_scalar::<_, i32>(
        "SELECT COALESCE(score, 0) FROM posts WHERE collection_run_id = $1",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(ScoreDistribution::from_scores(&scores))
}

/// Post counts per flair, most common first. Posts without flair are
/// grouped under `No Flair`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn flair_distribution(pool: &PgPool, run_id: i64) -> Result<Vec<FlairCount>, DbError> {
    let rows = sqlx::query_as::<_, FlairCount>(
        "SELECT COALESCE(flair_text, 'No Flair') AS flair, COUNT(*) AS count \
         FROM posts \
         WHERE collection_run_id = $1 \
         GROUP BY 1 \
         ORDER BY count DESC, flair",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Post authors in a run ranked by total post score. Deleted and unknown
/// authors are left out.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn top_post_authors(
    pool: &PgPool,
    run_id: i64,
    limit: i64,
) -> Result<Vec<AuthorScoreStats>, DbError> {
    let rows = sqlx::query_as::<_, AuthorScoreStats>(
        "SELECT author_name, \
                COUNT(*) AS count, \
                COALESCE(SUM(score), 0)::BIGINT AS total_score, \
                COALESCE(AVG(score), 0)::FLOAT8 AS avg_score \
         FROM posts \
         WHERE collection_run_id = $1 \
           AND author_name IS NOT NULL \
           AND author_name <> '[deleted]' \
         GROUP BY author_name \
         ORDER BY total_score DESC, count DESC, author_name \
         LIMIT $2",
    )
    .bind(run_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(round_averages(rows))
}

/// Commenters in a run ranked by total comment score, same exclusions as
/// [`top_post_authors`].
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn top_commenters(
    pool: &PgPool,
    run_id: i64,
    limit: i64,
) -> Result<Vec<AuthorScoreStats>, DbError> {
    let rows = sqlx::query_as::<_, AuthorScoreStats>(
        "SELECT author_name, \
                COUNT(*) AS count, \
                COALESCE(SUM(score), 0)::BIGINT AS total_score, \
                COALESCE(AVG(score), 0)::FLOAT8 AS avg_score \
         FROM comments \
         WHERE collection_run_id = $1 \
           AND author_name IS NOT NULL \
           AND author_name <> '[deleted]' \
         GROUP BY author_name \
         ORDER BY total_score DESC, count DESC, author_name \
         LIMIT $2",
    )
    .bind(run_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(round_averages(rows))
}

fn round_averages(rows: Vec<AuthorScoreStats>) -> Vec<AuthorScoreStats> {
    rows.into_iter()
        .map(|row| AuthorScoreStats {
            avg_score: round2(row.avg_score),
            ..row
        })
        .collect()
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn op_engagement(pool: &PgPool, run_id: i64) -> Result<OpEngagement, DbError> {
    let counts = sqlx::query_as::<_, OpEngagementCounts>(
        "SELECT \
             (SELECT COUNT(*) FROM posts WHERE collection_run_id = $1) AS total_posts, \
             COUNT(DISTINCT c.post_id) AS posts_with_comments, \
             COUNT(DISTINCT c.post_id) FILTER (WHERE c.is_submitter) AS posts_with_op_replies, \
             COUNT(*) FILTER (WHERE c.is_submitter) AS op_comment_count, \
             (AVG(c.score) FILTER (WHERE c.is_submitter))::FLOAT8 AS avg_op_comment_score \
         FROM comments c \
         WHERE c.collection_run_id = $1",
    )
    .bind(run_id)
    .fetch_one(pool)
    .await?;

    #[allow(clippy::cast_precision_loss)]
    let engagement_rate = if counts.posts_with_comments == 0 {
        0.0
    } else {
        round2(counts.posts_with_op_replies as f64 / counts.posts_with_comments as f64 * 100.0)
    };

    Ok(OpEngagement {
        total_posts: counts.total_posts,
        posts_with_comments: counts.posts_with_comments,
        posts_with_op_replies: counts.posts_with_op_replies,
        engagement_rate,
        op_comment_count: counts.op_comment_count,
        avg_op_comment_score: round2(counts.avg_op_comment_score.unwrap_or(0.0)),
    })
}
