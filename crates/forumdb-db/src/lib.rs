use std::time::Duration;

use forumdb_core::CoreError;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/forumdb-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &forumdb_core::AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("collection run {id} is not {expected_status}")]
    InvalidCollectionRunTransition {
        id: i64,
        expected_status: &'static str,
    },
    #[error("{child} {child_id} belongs to {owner} {actual}, not {expected}")]
    WrongOwner {
        child: &'static str,
        child_id: i64,
        owner: &'static str,
        expected: i64,
        actual: i64,
    },
    #[error(transparent)]
    Validation(#[from] CoreError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // The _sqlx_migrations table does not exist on a fresh database; treat
    // absence as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}


pub mod analysis;
pub mod authors;
pub mod collection_runs;
pub mod comments;
pub mod communities;
pub mod posts;
pub mod reports;
pub mod seed;
pub mod stats;

pub use analysis::{
    attach_analysis, attach_audience_analysis, get_analysis_result, get_audience_analysis,
    update_ai_analysis, AnalysisResultRow, AudienceAnalysisRow,
};
pub use authors::{
    get_author_by_username, list_authors, list_authors_by_karma, upsert_author, AuthorRow,
    AuthorUpsert,
};
pub use collection_runs::{
    begin_run, complete_run, fail_run, get_collection_run, get_latest_collection_run,
    list_collection_runs, list_running_runs, record_progress, sweep_stale_runs, CollectionRunRow,
};
pub use comments::{
    count_comments_for_run, insert_comment, insert_comments, list_comments_for_post,
    list_comments_for_run, list_op_comments, CommentRow,
};
pub use communities::{
    delete_community, get_community, get_community_by_name, list_communities, touch_community,
    update_community_subscribers, upsert_community, CommunityRow,
};
pub use posts::{
    count_posts_for_run, get_post, get_post_by_reddit_id, insert_post, list_posts_for_community,
    list_posts_for_run, upsert_post, PostRow, PostUpsert,
};
pub use reports::{add_report, get_latest_report, list_reports, ReportRow};
pub use seed::seed_communities;
pub use stats::{
    flair_distribution, op_engagement, score_distribution, top_commenters, top_post_authors,
    AuthorScoreStats, FlairCount, OpEngagement,
};
