//! Order upload command handlers for the CLI.
//!
//! These are called from `main` after the database pool and config are
//! established. `upload` runs the full resolve-and-write pipeline once,
//! `schedule` runs it on a cron, and `audit` re-reads the mapping-failure
//! counts of a finished run.

mod alert;
mod feed;
mod schedule;
mod upload;

use std::path::PathBuf;

use clap::Subcommand;

pub(crate) use schedule::run_orders_schedule;
pub(crate) use upload::run_orders_upload;

/// Sub-commands available under `orders`.
#[derive(Debug, Subcommand)]
pub enum OrdersCommands {
    /// Resolve a feed file against the catalog and write the results
    Upload {
        /// Feed file, JSON array or newline-delimited JSON (defaults to ORDSYNC_FEED_PATH)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Resolve and report without writing to the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Show mapping-failure counts for a finished upload run
    Audit {
        /// Upload run id
        #[arg(long)]
        run_id: i64,
    },
    /// Run uploads on the ORDSYNC_UPLOAD_CRON schedule until ctrl-c
    Schedule,
}

/// Print the mapping-failure audit of an upload run.
///
/// # Errors
///
/// Returns an error if the run does not exist or a query fails.
pub(crate) async fn run_orders_audit(pool: &sqlx::PgPool, run_id: i64) -> anyhow::Result<()> {
    let run = ordsync_db::get_upload_run(pool, run_id).await?;
    let audit = ordsync_db::audit_mapping_failures(pool, run.id).await?;

    println!(
        "run {} ({}): {} unmapped singles, {} unmapped bundles",
        run.id, run.status, audit.unmapped_singles, audit.unmapped_bundles
    );
    if !audit.sample_codes.is_empty() {
        println!("sample unmapped codes: {}", audit.sample_codes.join(", "));
    }

    Ok(())
}
