//! Collection-run command handlers for the CLI.
//!
//! Everything here except `fail` and `sweep` is read-only.

use std::time::Duration;

use clap::Subcommand;

use crate::communities::require_community;
use crate::{fmt_opt_time, fmt_time};

/// Sub-commands available under `runs`.
#[derive(Debug, Subcommand)]
pub enum RunsCommands {
    /// List recent runs for a community, newest first
    List {
        /// Community name (e.g. golang or r/golang)
        #[arg(long)]
        community: String,
        /// Maximum number of runs to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// Show one run with its stored content counts
    Show {
        #[arg(long)]
        id: i64,
    },
    /// Print a run's content statistics as JSON
    Stats {
        #[arg(long)]
        id: i64,
        /// Number of top authors and commenters to include
        #[arg(long, default_value = "10")]
        top: i64,
    },
    /// Mark a running run as failed
    Fail {
        #[arg(long)]
        id: i64,
        /// Error message stored on the run
        #[arg(long)]
        message: String,
    },
    /// Fail every running run with no recent activity
    Sweep {
        /// Idle threshold; defaults to FORUMDB_STALE_RUN_AFTER_MINS
        #[arg(long)]
        stale_after_mins: Option<u64>,
    },
}

pub(crate) async fn run(
    pool: &sqlx::PgPool,
    config: &forumdb_core::AppConfig,
    command: RunsCommands,
) -> anyhow::Result<()> {
    match command {
        RunsCommands::List { community, limit } => run_runs_list(pool, &community, limit).await,
        RunsCommands::Show { id } => run_runs_show(pool, id).await,
        RunsCommands::Stats { id, top } => run_runs_stats(pool, id, top).await,
        RunsCommands::Fail { id, message } => {
            let row = forumdb_db::fail_run(pool, id, &message).await?;
            println!("run {} marked failed at {}", row.id, fmt_opt_time(row.completed_at));
            Ok(())
        }
        RunsCommands::Sweep { stale_after_mins } => {
            let mins = stale_after_mins.unwrap_or(config.stale_run_after_mins);
            run_runs_sweep(pool, mins).await
        }
    }
}

async fn run_runs_list(pool: &sqlx::PgPool, community: &str, limit: i64) -> anyhow::Result<()> {
    let community = require_community(pool, community).await?;
    let runs = forumdb_db::list_collection_runs(pool, community.id, limit).await?;

    if runs.is_empty() {
        println!("no runs for {}; run `ingest` first", community.name);
        return Ok(());
    }

    println!(
        "{:<8}{:<11}{:<18}{:<18}{:>7}{:>10}",
        "ID", "STATUS", "STARTED", "COMPLETED", "POSTS", "COMMENTS"
    );
    for run in &runs {
        println!(
            "{:<8}{:<11}{:<18}{:<18}{:>7}{:>10}",
            run.id,
            run.status,
            fmt_time(run.started_at),
            fmt_opt_time(run.completed_at),
            run.posts_collected,
            run.comments_collected
        );
    }

    Ok(())
}

async fn run_runs_show(pool: &sqlx::PgPool, id: i64) -> anyhow::Result<()> {
    let run = forumdb_db::get_collection_run(pool, id).await?;
    let community = forumdb_db::get_community(pool, run.community_id).await?;
    let stored_posts = forumdb_db::count_posts_for_run(pool, id).await?;
    let stored_comments = forumdb_db::count_comments_for_run(pool, id).await?;
    let analysis = forumdb_db::get_analysis_result(pool, id).await?;
    let audience = forumdb_db::get_audience_analysis(pool, id).await?;
    let reports = forumdb_db::list_reports(pool, id).await?;

    println!("Run: {} ({})", run.id, run.public_id);
    println!("Community: {}", community.name);
    println!("Status: {}", run.status);
    println!("Started: {}", fmt_time(run.started_at));
    println!("Completed: {}", fmt_opt_time(run.completed_at));
    println!("Last activity: {}", fmt_time(run.last_activity_at));
    println!(
        "Collected: {} posts, {} comments (stored: {stored_posts} posts, {stored_comments} comment rows)",
        run.posts_collected, run.comments_collected
    );
    if let Some(message) = &run.error_message {
        println!("Error: {message}");
    }
    println!(
        "Analysis: {}",
        if analysis.is_some() { "attached" } else { "none" }
    );
    println!(
        "Audience analysis: {}",
        if audience.is_some() { "attached" } else { "none" }
    );
    println!("Reports: {}", reports.len());

    Ok(())
}

async fn run_runs_stats(pool: &sqlx::PgPool, id: i64, top: i64) -> anyhow::Result<()> {
    // Fails with NotFound before running the aggregates on an unknown id.
    forumdb_db::get_collection_run(pool, id).await?;

    let scores = forumdb_db::score_distribution(pool, id).await?;
    let flairs = forumdb_db::flair_distribution(pool, id).await?;
    let authors = forumdb_db::top_post_authors(pool, id, top).await?;
    let commenters = forumdb_db::top_commenters(pool, id, top).await?;
    let op = forumdb_db::op_engagement(pool, id).await?;

    let stats = serde_json::json!({
        "run_id": id,
        "score_distribution": scores,
        "flair_distribution": flairs,
        "top_post_authors": authors,
        "top_commenters": commenters,
        "op_engagement": op,
    });
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}

// A century; anything longer overflows a Postgres interval.
const MAX_STALE_AFTER_MINS: u64 = 100 * 365 * 24 * 60;

/// Idle threshold for `runs sweep`, capped so huge inputs cannot overflow.
pub(crate) fn stale_threshold(stale_after_mins: u64) -> Duration {
    Duration::from_secs(stale_after_mins.min(MAX_STALE_AFTER_MINS) * 60)
}

async fn run_runs_sweep(pool: &sqlx::PgPool, stale_after_mins: u64) -> anyhow::Result<()> {
    let swept = forumdb_db::sweep_stale_runs(pool, stale_threshold(stale_after_mins)).await?;

    if swept.is_empty() {
        println!("no runs idle for more than {stale_after_mins} minutes");
        return Ok(());
    }

    for run in &swept {
        println!(
            "failed run {} (community {}), last activity {}",
            run.id,
            run.community_id,
            fmt_time(run.last_activity_at)
        );
    }
    println!("swept {} stale runs", swept.len());

    Ok(())
}
