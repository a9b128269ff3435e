//! Offline unit tests for forumdb-db pool configuration and row types.
//! These tests do not require a live database connection.

use std::path::PathBuf;

use chrono::Utc;
use forumdb_core::{AppConfig, Environment, ParentRef, RunStatus, SkepticismLevel};
use forumdb_db::{AudienceAnalysisRow, CollectionRunRow, CommentRow, DbError, PoolConfig};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        log_level: "info".to_string(),
        communities_path: PathBuf::from("./config/communities.yaml"),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        stale_run_after_mins: 120,
        ingest_concurrency: 4,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`CollectionRunRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn collection_run_row_has_expected_fields() {
    let now = Utc::now();
    let row = CollectionRunRow {
        id: 1,
        public_id: uuid::Uuid::new_v4(),
        community_id: 3,
        status: "running".to_string(),
        started_at: now,
        completed_at: None,
        last_activity_at: now,
        posts_collected: 0,
        comments_collected: 0,
        error_message: None,
    };

    assert_eq!(row.run_status(), Ok(RunStatus::Running));
    assert!(row.completed_at.is_none());
}

#[test]
fn collection_run_row_rejects_unknown_status() {
    let now = Utc::now();
    let row = CollectionRunRow {
        id: 1,
        public_id: uuid::Uuid::new_v4(),
        community_id: 3,
        status: "queued".to_string(),
        started_at: now,
        completed_at: None,
        last_activity_at: now,
        posts_collected: 0,
        comments_collected: 0,
        error_message: None,
    };

    assert!(row.run_status().is_err());
}

fn comment_row(parent_reddit_id: Option<&str>, parent_comment_id: Option<i64>) -> CommentRow {
    CommentRow {
        id: 10,
        reddit_id: "c2".to_string(),
        post_id: 5,
        collection_run_id: 1,
        parent_reddit_id: parent_reddit_id.map(str::to_string),
        parent_comment_id,
        author_name: Some("gopher".to_string()),
        body: Some("agreed".to_string()),
        score: Some(3),
        depth: 1,
        is_submitter: false,
        created_utc: None,
        collected_at: Utc::now(),
    }
}

#[test]
fn comment_row_parent_reflects_resolution() {
    assert_eq!(comment_row(None, None).parent(), None);
    assert_eq!(
        comment_row(Some("c1"), None).parent(),
        Some(ParentRef::Unresolved("c1".to_string()))
    );
    assert_eq!(
        comment_row(Some("c1"), Some(9)).parent(),
        Some(ParentRef::Resolved {
            comment_id: 9,
            external_id: "c1".to_string(),
        })
    );
}

#[test]
fn audience_row_parses_stored_skepticism() {
    let mut row = AudienceAnalysisRow {
        id: 1,
        collection_run_id: 1,
        self_identifications: None,
        skill_levels: None,
        goals_motivations: None,
        pain_points: None,
        tools_mentioned: None,
        budget_signals: None,
        skepticism_level: Some("high".to_string()),
        personas: None,
        created_at: Utc::now(),
    };
    assert_eq!(row.skepticism(), Ok(Some(SkepticismLevel::High)));

    row.skepticism_level = Some("extreme".to_string());
    assert!(row.skepticism().is_err());
}

#[test]
fn validation_errors_convert_into_db_error() {
    let err: DbError = forumdb_core::CoreError::Empty { field: "post title" }.into();
    assert!(matches!(err, DbError::Validation(_)));
    assert_eq!(err.to_string(), "post title must be non-empty");
}
