//! Upload run history.

use chrono::{DateTime, Utc};
use clap::Subcommand;

/// Sub-commands available under `runs`.
#[derive(Debug, Subcommand)]
pub enum RunsCommands {
    /// List recent upload runs, newest first
    List {
        /// Maximum number of runs to show
        #[arg(long, default_value = "20")]
        limit: u32,
    },
}

/// Print the most recent upload runs.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_runs_list(pool: &sqlx::PgPool, limit: u32) -> anyhow::Result<()> {
    let runs = ordsync_db::list_upload_runs(pool, i64::from(limit)).await?;

    if runs.is_empty() {
        println!("no upload runs found; run `orders upload` first");
        return Ok(());
    }

    println!(
        "{:<8}{:<11}{:<11}{:<18}{:>8}{:>9}{:>10}  ERROR",
        "ID", "STATUS", "TRIGGER", "STARTED", "LINES", "DROPPED", "WRITTEN"
    );
    for run in &runs {
        println!(
            "{:<8}{:<11}{:<11}{:<18}{:>8}{:>9}{:>10}  {}",
            run.id,
            run.status,
            run.trigger_source,
            fmt_time(run.started_at),
            run.lines_received,
            run.lines_dropped,
            run.records_written,
            run.error_message.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

/// Format an optional timestamp for display, returning `"-"` when `None`.
fn fmt_time(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}
