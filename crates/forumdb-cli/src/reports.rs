//! Report command handlers for the CLI.

use clap::Subcommand;

use crate::fmt_time;

/// Sub-commands available under `reports`.
#[derive(Debug, Subcommand)]
pub enum ReportsCommands {
    /// List reports attached to a run, newest first
    List {
        #[arg(long)]
        run: i64,
        /// Print only the latest report of this type, in full
        #[arg(long = "type")]
        report_type: Option<String>,
    },
}

pub(crate) async fn run(pool: &sqlx::PgPool, command: ReportsCommands) -> anyhow::Result<()> {
    match command {
        ReportsCommands::List {
            run,
            report_type: Some(report_type),
        } => {
            let report = forumdb_db::get_latest_report(pool, run, &report_type)
                .await?
                .ok_or_else(|| {
                    anyhow::anyhow!("run {run} has no '{report_type}' report")
                })?;
            println!(
                "# {} (report {}, {})",
                report.report_type,
                report.id,
                fmt_time(report.created_at)
            );
            println!();
            println!("{}", report.content);
            Ok(())
        }
        ReportsCommands::List {
            run,
            report_type: None,
        } => run_reports_list(pool, run).await,
    }
}

async fn run_reports_list(pool: &sqlx::PgPool, run_id: i64) -> anyhow::Result<()> {
    let reports = forumdb_db::list_reports(pool, run_id).await?;

    if reports.is_empty() {
        println!("no reports for run {run_id}");
        return Ok(());
    }

    println!("{:<8}{:<22}{:<18}{:>9}", "ID", "TYPE", "CREATED", "CHARS");
    for report in &reports {
        println!(
            "{:<8}{:<22}{:<18}{:>9}",
            report.id,
            report.report_type,
            fmt_time(report.created_at),
            report.content.chars().count()
        );
    }

    Ok(())
}
