mod orders;
mod runs;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::orders::OrdersCommands;
use crate::runs::RunsCommands;

#[derive(Debug, Parser)]
#[command(name = "ordsync-cli")]
#[command(about = "Sabangnet order upload and catalog resolution")]
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
    /// Resolve and upload marketplace order feeds
    Orders {
        #[command(subcommand)]
        command: OrdersCommands,
    },
    /// Inspect upload run history
    Runs {
        #[command(subcommand)]
        command: RunsCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Load products, packagings and BOM edges from a catalog YAML file
    SeedCatalog {
        /// Catalog file (defaults to ORDSYNC_CATALOG_PATH)
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("ordsync-cli ready; run with --help to list commands");
        return Ok(());
    };

    let config = Arc::new(ordsync_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool = ordsync_db::connect_pool_from_config(&config)
        .await
        .context("connecting to database")?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                ordsync_db::ping(&pool).await?;
                println!("database ok");
            }
            DbCommands::Migrate => {
                let applied = ordsync_db::run_migrations(&pool).await?;
                println!("applied {applied} migrations");
            }
            DbCommands::SeedCatalog { file } => {
                let path = file.unwrap_or_else(|| config.catalog_path.clone());
                let catalog = ordsync_core::load_catalog_file(&path)?;
                let summary = ordsync_db::seed_catalog(&pool, &catalog).await?;
                println!(
                    "seeded {} products, {} packagings, {} BOM edges from {}",
                    summary.products,
                    summary.packagings,
                    summary.bom_edges,
                    path.display()
                );
            }
        },
        Commands::Orders { command } => match command {
            OrdersCommands::Upload { file, dry_run } => {
                let path = file
                    .or_else(|| config.feed_path.clone())
                    .context("no feed file given; pass --file or set ORDSYNC_FEED_PATH")?;
                let cancel = cancel_on_ctrl_c();
                orders::run_orders_upload(
                    &pool,
                    &config,
                    &path,
                    dry_run,
                    ordsync_db::TriggerSource::Cli,
                    &cancel,
                )
                .await?;
            }
            OrdersCommands::Audit { run_id } => orders::run_orders_audit(&pool, run_id).await?,
            OrdersCommands::Schedule => {
                orders::run_orders_schedule(pool.clone(), Arc::clone(&config)).await?;
            }
        },
        Commands::Runs { command } => match command {
            RunsCommands::List { limit } => runs::run_runs_list(&pool, limit).await?,
        },
    }

    Ok(())
}

/// Flag set by the first ctrl-c; the writer stops at the next batch boundary.
fn cancel_on_ctrl_c() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("ctrl-c received; stopping after the current batch");
            flag.store(true, Ordering::SeqCst);
        }
    });
    cancel
}

/// Mark an upload run failed, logging (not propagating) any error doing so.
async fn fail_run_best_effort(pool: &sqlx::PgPool, run_id: i64, message: String) {
    if let Err(mark_err) = ordsync_db::fail_upload_run(pool, run_id, &message).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark upload run as failed"
        );
    }
}
