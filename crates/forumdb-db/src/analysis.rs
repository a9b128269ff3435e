//! Database operations for `analysis_results` and `audience_analyses`.
//!
//! Each table holds at most one row per run. Documents are opaque JSONB.

use chrono::{DateTime, Utc};
use forumdb_core::{
    AiAnalysisDocuments, AnalysisDocuments, AudienceDocuments, CoreError, SkepticismLevel,
};
use serde_json::Value;
use sqlx::PgPool;

use crate::{is_foreign_key_violation, is_unique_violation, DbError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnalysisResultRow {
    pub id: i64,
    pub collection_run_id: i64,
    pub score_distribution: Option<Value>,
    pub flair_distribution: Option<Value>,
    pub timing_patterns: Option<Value>,
    pub title_analysis: Option<Value>,
    pub op_engagement_analysis: Option<Value>,
    pub upvote_ratio_analysis: Option<Value>,
    pub post_format_analysis: Option<Value>,
    pub author_success_analysis: Option<Value>,
    pub sentiment_analysis: Option<Value>,
    pub pain_point_analysis: Option<Value>,
    pub tone_analysis: Option<Value>,
    pub promotion_analysis: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AudienceAnalysisRow {
    pub id: i64,
    pub collection_run_id: i64,
    pub self_identifications: Option<Value>,
    pub skill_levels: Option<Value>,
    pub goals_motivations: Option<Value>,
    pub pain_points: Option<Value>,
    pub tools_mentioned: Option<Value>,
    pub budget_signals: Option<Value>,
    pub skepticism_level: Option<String>,
    pub personas: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl AudienceAnalysisRow {
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSkepticismLevel`] if the stored label is
    /// not a known level.
    pub fn skepticism(&self) -> Result<Option<SkepticismLevel>, CoreError> {
        self.skepticism_level.as_deref().map(str::parse).transpose()
    }
}

fn attach_error(err: sqlx::Error, what: &str, run_id: i64) -> DbError {
    if is_unique_violation(&err) {
        DbError::Conflict(format!("collection run {run_id} already has {what}"))
    } else if is_foreign_key_violation(&err) {
        DbError::not_found("collection run", run_id)
    } else {
        DbError::Sqlx(err)
    }
}

// ---------------------------------------------------------------------------
// Analysis results
// ---------------------------------------------------------------------------

/// Attaches the statistical analysis for a run.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] if the run already has one,
/// [`DbError::NotFound`] if the run does not exist, or [`DbError::Sqlx`]
/// on database failure.
pub async fn attach_analysis(
    pool: &PgPool,
    run_id: i64,
    docs: &AnalysisDocuments,
) -> Result<AnalysisResultRow, DbError> {
    let row = sqlx::query_as::<_, AnalysisResultRow>(
        "INSERT INTO analysis_results \
             (collection_run_id, score_distribution, flair_distribution, timing_patterns, \
              title_analysis, op_engagement_analysis, upvote_ratio_analysis, \
              post_format_analysis, author_success_analysis) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING id, collection_run_id, score_distribution, flair_distribution, \
                   timing_patterns, title_analysis, op_engagement_analysis, \
                   upvote_ratio_analysis, post_format_analysis, author_success_analysis, \
                   sentiment_analysis, pain_point_analysis, tone_analysis, \
                   promotion_analysis, created_at",
    )
    .bind(run_id)
    .bind(docs.score_distribution.as_ref())
    .bind(docs.flair_distribution.as_ref())
    .bind(docs.timing_patterns.as_ref())
    .bind(docs.title_analysis.as_ref())
    .bind(docs.op_engagement_analysis.as_ref())
    .bind(docs.upvote_ratio_analysis.as_ref())
    .bind(docs.post_format_analysis.as_ref())
    .bind(docs.author_success_analysis.as_ref())
    .fetch_one(pool)
    .await
    .map_err(|e| attach_error(e, "an analysis result", run_id))?;

    tracing::info!(run_id, analysis_id = row.id, "analysis attached");
    Ok(row)
}

/// Fills the model-generated documents on a run's existing analysis.
///
/// Only the documents present in `docs` are written; the rest keep their
/// stored values.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the run has no analysis yet, or
/// [`DbError::Sqlx`] on database failure.
pub async fn update_ai_analysis(
    pool: &PgPool,
    run_id: i64,
    docs: &AiAnalysisDocuments,
) -> Result<AnalysisResultRow, DbError> {
    sqlx::query_as::<_, AnalysisResultRow>(
        "UPDATE analysis_results \
         SET sentiment_analysis  = COALESCE($2, sentiment_analysis), \
             pain_point_analysis = COALESCE($3, pain_point_analysis), \
             tone_analysis       = COALESCE($4, tone_analysis), \
             promotion_analysis  = COALESCE($5, promotion_analysis) \
         WHERE collection_run_id = $1 \
         RETURNING id, collection_run_id, score_distribution, flair_distribution, \
                   timing_patterns, title_analysis, op_engagement_analysis, \
                   upvote_ratio_analysis, post_format_analysis, author_success_analysis, \
                   sentiment_analysis, pain_point_analysis, tone_analysis, \
                   promotion_analysis, created_at",
    )
    .bind(run_id)
    .bind(docs.sentiment_analysis.as_ref())
    .bind(docs.pain_point_analysis.as_ref())
    .bind(docs.tone_analysis.as_ref())
    .bind(docs.promotion_analysis.as_ref())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DbError::not_found("analysis result for collection run", run_id))
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn get_analysis_result(
    pool: &PgPool,
    run_id: i64,
) -> Result<Option<AnalysisResultRow>, DbError> {
    let row = sqlx::query_as::<_, AnalysisResultRow>(
        "SELECT id, collection_run_id, score_distribution, flair_distribution, \
                timing_patterns, title_analysis, op_engagement_analysis, \
                upvote_ratio_analysis, post_format_analysis, author_success_analysis, \
                sentiment_analysis, pain_point_analysis, tone_analysis, \
                promotion_analysis, created_at \
         FROM analysis_results \
         WHERE collection_run_id = $1",
    )
    .bind(run_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

// ---------------------------------------------------------------------------
// Audience analyses
// ---------------------------------------------------------------------------

/// Attaches the audience characterization for a run.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] if the run already has one,
/// [`DbError::NotFound`] if the run does not exist, or [`DbError::Sqlx`]
/// on database failure.
pub async fn attach_audience_analysis(
    pool: &PgPool,
    run_id: i64,
    docs: &AudienceDocuments,
) -> Result<AudienceAnalysisRow, DbError> {
    let row = sqlx::query_as::<_, AudienceAnalysisRow>(
        "INSERT INTO audience_analyses \
             (collection_run_id, self_identifications, skill_levels, goals_motivations, \
              pain_points, tools_mentioned, budget_signals, skepticism_level, personas) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING id, collection_run_id, self_identifications, skill_levels, \
                   goals_motivations, pain_points, tools_mentioned, budget_signals, \
                   skepticism_level, personas, created_at",
    )
    .bind(run_id)
    .bind(docs.self_identifications.as_ref())
    .bind(docs.skill_levels.as_ref())
    .bind(docs.goals_motivations.as_ref())
    .bind(docs.pain_points.as_ref())
    .bind(docs.tools_mentioned.as_ref())
    .bind(docs.budget_signals.as_ref())
    .bind(docs.skepticism_level.map(SkepticismLevel::as_str))
    .bind(docs.personas.as_ref())
    .fetch_one(pool)
    .await
    .map_err(|e| attach_error(e, "an audience analysis", run_id))?;

    tracing::info!(run_id, audience_analysis_id = row.id, "audience analysis attached");
    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] on database failure.
pub async fn get_audience_analysis(
    pool: &PgPool,
    run_id: i64,
) -> Result<Option<AudienceAnalysisRow>, DbError> {
    let row = sqlx::query_as::<_, AudienceAnalysisRow>(
        "SELECT id, collection_run_id, self_identifications, skill_levels, \
                goals_motivations, pain_points, tools_mentioned, budget_signals, \
                skepticism_level, personas, created_at \
         FROM audience_analyses \
         WHERE collection_run_id = $1",
    )
    .bind(run_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
