//! File-based ingestion of collector dumps.
//!
//! A dump is loaded in full, checked, and written into a fresh collection
//! run. Posts are upserted concurrently; each post's comments are
//! de-duplicated and appended in one transaction, then the run's progress
//! is recorded. Any database failure aborts the ingest and marks the run
//! failed.

use std::collections::HashMap;
use std::path::Path;

use futures::stream::{self, StreamExt};
use forumdb_core::{
    dedupe_comments, normalize_community_name, CollectionDump, DumpPost, NewCommunity,
    RunStatus,
};

use crate::fail_run_best_effort;

/// Totals for one completed ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IngestSummary {
    pub run_id: i64,
    pub community: String,
    pub posts: i32,
    pub comments: i32,
    pub skipped_posts: usize,
    pub skipped_comments: usize,
}

/// Ingest a collector dump file for one community.
///
/// When `dry_run` is `true` the dump is loaded and checked, a summary is
/// printed, and nothing is written.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded, the dump names a different
/// community, the community already has a running run and `force` is not
/// set, or any database write fails.
pub(crate) async fn run_ingest(
    pool: &sqlx::PgPool,
    config: &forumdb_core::AppConfig,
    community: &str,
    file: &Path,
    force: bool,
    dry_run: bool,
) -> anyhow::Result<()> {
    let dump = forumdb_core::load_dump(file)?;

    if dry_run {
        let total_comments = dump.comment_count();
        let prepared = prepare_posts(dump.posts);
        println!(
            "dry-run: would ingest {} posts and {} comments into {} ({} posts and {} comments invalid, {} total comments in file)",
            prepared.posts.len(),
            prepared.posts.iter().map(|p| p.comments.len()).sum::<usize>(),
            normalize_community_name(community),
            prepared.skipped_posts,
            prepared.skipped_comments,
            total_comments
        );
        return Ok(());
    }

    let summary = ingest_dump(pool, config.ingest_concurrency, community, dump, force).await?;

    println!(
        "ingested {} posts, {} comments into {} (run {})",
        summary.posts, summary.comments, summary.community, summary.run_id
    );
    if summary.skipped_posts > 0 || summary.skipped_comments > 0 {
        println!(
            "skipped {} invalid posts and {} invalid comments",
            summary.skipped_posts, summary.skipped_comments
        );
    }

    Ok(())
}

/// Write an already-loaded dump into a new run for `community`.
///
/// # Errors
///
/// See [`run_ingest`].
pub(crate) async fn ingest_dump(
    pool: &sqlx::PgPool,
    concurrency: usize,
    community: &str,
    dump: CollectionDump,
    force: bool,
) -> anyhow::Result<IngestSummary> {
    let name = normalize_community_name(community);
    let metadata = match dump.community {
        Some(meta) => {
            let dumped = normalize_community_name(&meta.name);
            if dumped != name {
                anyhow::bail!("dump was collected from '{dumped}', not '{name}'");
            }
            meta
        }
        None => NewCommunity::new(name.as_str()),
    };
    let (community_row, created) = forumdb_db::upsert_community(pool, &metadata).await?;
    if created {
        tracing::info!(community = %community_row.name, "tracking new community");
    }

    if let Some(latest) = forumdb_db::get_latest_collection_run(pool, community_row.id).await? {
        if latest.run_status()? == RunStatus::Running {
            if !force {
                anyhow::bail!(
                    "community '{}' already has run {} in progress; \
                     wait for it, close it with `runs fail`, or pass --force",
                    community_row.name,
                    latest.id
                );
            }
            tracing::warn!(
                community = %community_row.name,
                run_id = latest.id,
                "beginning a second concurrent run (--force)"
            );
        }
    }

    let PreparedPosts {
        posts,
        skipped_posts,
        skipped_comments,
    } = prepare_posts(dump.posts);

    let run = forumdb_db::begin_run(pool, community_row.id).await?;

    let result: anyhow::Result<(i32, i32)> = async {
        let outcomes: Vec<anyhow::Result<i32>> = stream::iter(posts)
            .map(|post| ingest_post(pool, run.id, community_row.id, post))
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut posts: i32 = 0;
        let mut comments: i32 = 0;
        for outcome in outcomes {
            comments = comments.saturating_add(outcome?);
            posts = posts.saturating_add(1);
        }
        Ok((posts, comments))
    }
    .await;

    match result {
        Ok((posts, comments)) => {
            if let Err(err) = forumdb_db::complete_run(pool, run.id).await {
                fail_run_best_effort(pool, run.id, "ingest", format!("{err:#}")).await;
                return Err(err.into());
            }
            Ok(IngestSummary {
                run_id: run.id,
                community: community_row.name,
                posts,
                comments,
                skipped_posts,
                skipped_comments,
            })
        }
        Err(err) => {
            fail_run_best_effort(pool, run.id, "ingest", format!("{err:#}")).await;
            Err(err)
        }
    }
}

/// Upsert one post, append its comments, and record the progress.
///
/// Returns the number of comment rows written.
async fn ingest_post(
    pool: &sqlx::PgPool,
    run_id: i64,
    community_id: i64,
    post: DumpPost,
) -> anyhow::Result<i32> {
    let upsert = forumdb_db::upsert_post(pool, run_id, community_id, &post.post).await?;
    let rows = forumdb_db::insert_comments(pool, run_id, upsert.id, &post.comments).await?;

    let written = i32::try_from(rows.len()).unwrap_or(i32::MAX);
    forumdb_db::record_progress(pool, run_id, 1, written).await?;
    Ok(written)
}

/// Posts ready to write, plus how many records were dropped on the way.
struct PreparedPosts {
    posts: Vec<DumpPost>,
    skipped_posts: usize,
    skipped_comments: usize,
}

/// Drop invalid records, merge repeated posts, and de-duplicate comments.
///
/// Each listing is checked on its own, so an invalid repeat never takes a
/// valid listing down with it. A post listed twice keeps its first position,
/// takes the later fields, and carries the comments of both listings.
/// Fullname parent pointers are rewritten to bare comment ids.
fn prepare_posts(posts: Vec<DumpPost>) -> PreparedPosts {
    let mut prepared = PreparedPosts {
        posts: Vec::with_capacity(posts.len()),
        skipped_posts: 0,
        skipped_comments: 0,
    };
    let mut index: HashMap<String, usize> = HashMap::new();

    for mut post in posts {
        if let Err(e) = post.post.validate() {
            tracing::warn!(
                reddit_id = %post.post.reddit_id,
                error = %e,
                "skipping post: invalid"
            );
            prepared.skipped_posts += 1;
            prepared.skipped_comments += post.comments.len();
            continue;
        }

        let before = post.comments.len();
        post.comments.retain(|c| match c.validate() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    reddit_id = %c.reddit_id,
                    post = %post.post.reddit_id,
                    error = %e,
                    "skipping comment: invalid"
                );
                false
            }
        });
        prepared.skipped_comments += before - post.comments.len();
        for comment in &mut post.comments {
            comment.normalize_parent();
        }

        if let Some(&i) = index.get(&post.post.reddit_id) {
            let existing = &mut prepared.posts[i];
            existing.post = post.post;
            existing.comments.extend(post.comments);
        } else {
            index.insert(post.post.reddit_id.clone(), prepared.posts.len());
            prepared.posts.push(post);
        }
    }

    for post in &mut prepared.posts {
        post.comments = dedupe_comments(std::mem::take(&mut post.comments));
    }

    prepared
}

#[cfg(test)]
#[path = "ingest_test.rs"]
mod tests;
