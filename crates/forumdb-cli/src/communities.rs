//! Community command handlers for the CLI.

use clap::Subcommand;

use crate::{fmt_opt_time, fmt_time};

/// Sub-commands available under `communities`.
#[derive(Debug, Subcommand)]
pub enum CommunitiesCommands {
    /// List tracked communities
    List,
    /// Show one community and its most recent run
    Show {
        /// Community name (e.g. golang or r/golang)
        #[arg(long)]
        name: String,
    },
    /// Delete a community and everything collected for it
    Delete {
        /// Community name (e.g. golang or r/golang)
        #[arg(long)]
        name: String,
    },
}

pub(crate) async fn run(pool: &sqlx::PgPool, command: CommunitiesCommands) -> anyhow::Result<()> {
    match command {
        CommunitiesCommands::List => run_communities_list(pool).await,
        CommunitiesCommands::Show { name } => run_communities_show(pool, &name).await,
        CommunitiesCommands::Delete { name } => run_communities_delete(pool, &name).await,
    }
}

/// Look a community up by name, failing with a hint when it is unknown.
pub(crate) async fn require_community(
    pool: &sqlx::PgPool,
    name: &str,
) -> anyhow::Result<forumdb_db::CommunityRow> {
    forumdb_db::get_community_by_name(pool, name)
        .await?
        .ok_or_else(|| anyhow::anyhow!("community '{name}' not found; run `db seed` first"))
}

async fn run_communities_list(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let communities = forumdb_db::list_communities(pool).await?;

    if communities.is_empty() {
        println!("no communities tracked; run `db seed` first");
        return Ok(());
    }

    println!("{:<6}{:<23}{:>12}  UPDATED", "ID", "NAME", "SUBSCRIBERS");
    for c in &communities {
        let subscribers = c
            .subscribers
            .map_or_else(|| "\u{2014}".to_string(), |s| s.to_string());
        println!(
            "{:<6}{:<23}{:>12}  {}",
            c.id,
            c.name,
            subscribers,
            fmt_time(c.updated_at)
        );
    }

    Ok(())
}

async fn run_communities_show(pool: &sqlx::PgPool, name: &str) -> anyhow::Result<()> {
    let community = require_community(pool, name).await?;
    let latest = forumdb_db::get_latest_collection_run(pool, community.id).await?;

    println!("Community: {} (id {})", community.name, community.id);
    if let Some(display) = &community.display_name {
        println!("Display name: {display}");
    }
    if let Some(description) = &community.description {
        println!("Description: {description}");
    }
    if let Some(subscribers) = community.subscribers {
        println!("Subscribers: {subscribers}");
    }
    println!("Created: {}", fmt_time(community.created_at));
    println!("Updated: {}", fmt_time(community.updated_at));

    match latest {
        Some(run) => println!(
            "Latest run: {} ({}) started {}, completed {}, {} posts, {} comments",
            run.id,
            run.status,
            fmt_time(run.started_at),
            fmt_opt_time(run.completed_at),
            run.posts_collected,
            run.comments_collected
        ),
        None => println!("Latest run: none"),
    }

    Ok(())
}

async fn run_communities_delete(pool: &sqlx::PgPool, name: &str) -> anyhow::Result<()> {
    let community = require_community(pool, name).await?;

    if forumdb_db::delete_community(pool, community.id).await? {
        println!(
            "deleted community {} and all of its runs, posts, comments, analyses and reports",
            community.name
        );
    } else {
        println!("community {} was already gone", community.name);
    }

    Ok(())
}
