use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod communities;
mod ingest;
mod reports;
mod runs;

use communities::CommunitiesCommands;
use reports::ReportsCommands;
use runs::RunsCommands;

#[derive(Debug, Parser)]
#[command(name = "forumdb-cli")]
#[command(about = "Forum collection ledger command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Inspect and manage tracked communities
    Communities {
        #[command(subcommand)]
        command: CommunitiesCommands,
    },
    /// Inspect and close collection runs
    Runs {
        #[command(subcommand)]
        command: RunsCommands,
    },
    /// Inspect generated reports
    Reports {
        #[command(subcommand)]
        command: ReportsCommands,
    },
    /// Load a collector dump into a new collection run
    Ingest {
        /// Community the dump was collected from (e.g. golang or r/golang)
        #[arg(long)]
        community: String,
        /// Path to the JSON dump
        #[arg(long)]
        file: PathBuf,
        /// Begin a run even if the community already has one running
        #[arg(long)]
        force: bool,
        /// Validate the dump and print what would be ingested without writing
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Upsert tracked communities from the communities file
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("forumdb-cli: no command given; try --help");
        return Ok(());
    };

    let config = forumdb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = forumdb_db::PoolConfig::from_app_config(&config);
    let pool = forumdb_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                forumdb_db::ping(&pool).await?;
                println!("database ok");
            }
            DbCommands::Migrate => {
                let applied = forumdb_db::run_migrations(&pool).await?;
                println!("applied {applied} migrations");
            }
            DbCommands::Seed => run_db_seed(&pool, &config).await?,
        },
        Commands::Communities { command } => communities::run(&pool, command).await?,
        Commands::Runs { command } => runs::run(&pool, &config, command).await?,
        Commands::Reports { command } => reports::run(&pool, command).await?,
        Commands::Ingest {
            community,
            file,
            force,
            dry_run,
        } => ingest::run_ingest(&pool, &config, &community, &file, force, dry_run).await?,
    }

    Ok(())
}

/// Load the communities file and upsert every entry.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or the seed transaction
/// fails; nothing is written in that case.
async fn run_db_seed(
    pool: &sqlx::PgPool,
    config: &forumdb_core::AppConfig,
) -> anyhow::Result<()> {
    let file = forumdb_core::load_communities(&config.communities_path)?;
    let count = forumdb_db::seed_communities(pool, &file.communities).await?;
    println!(
        "seeded {count} communities from {}",
        config.communities_path.display()
    );
    Ok(())
}

/// Attempt to mark a collection run as failed, logging any secondary error.
pub(crate) async fn fail_run_best_effort(
    pool: &sqlx::PgPool,
    run_id: i64,
    context: &'static str,
    message: String,
) {
    if let Err(mark_err) = forumdb_db::fail_run(pool, run_id, &message).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark {context} run as failed"
        );
    }
}

/// Format a timestamp for table output.
pub(crate) fn fmt_time(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// Format an optional timestamp; `None` renders as a dash placeholder.
pub(crate) fn fmt_opt_time(ts: Option<chrono::DateTime<chrono::Utc>>) -> String {
    ts.map_or_else(|| "\u{2014}".to_string(), fmt_time)
}
