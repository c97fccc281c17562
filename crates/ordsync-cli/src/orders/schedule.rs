//! Cron-driven uploads.
//!
//! One job re-reads `ORDSYNC_FEED_PATH` on every tick of
//! `ORDSYNC_UPLOAD_CRON`. A tick that fires while the previous upload is
//! still running is skipped. Ctrl-c stops the scheduler, asks any in-flight
//! write to stop at its next batch boundary, and waits for that upload to
//! record its outcome before returning.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use ordsync_core::AppConfig;
use ordsync_db::TriggerSource;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use super::upload::run_orders_upload;

/// Run scheduled uploads until ctrl-c.
///
/// # Errors
///
/// Returns an error if no feed path is configured, the cron expression is
/// invalid, or the scheduler cannot be started or stopped.
pub(crate) async fn run_orders_schedule(
    pool: PgPool,
    config: Arc<AppConfig>,
) -> anyhow::Result<()> {
    let feed_path = config
        .feed_path
        .clone()
        .context("ORDSYNC_FEED_PATH must be set for scheduled uploads")?;
    let cancel = Arc::new(AtomicBool::new(false));
    let running = Arc::new(Mutex::new(()));

    let mut scheduler = JobScheduler::new().await?;
    register_upload_job(
        &scheduler,
        pool,
        Arc::clone(&config),
        feed_path,
        Arc::clone(&cancel),
        Arc::clone(&running),
    )
    .await
    .with_context(|| format!("registering upload job for cron '{}'", config.upload_cron))?;
    scheduler.start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("scheduler: ctrl-c received, shutting down");
    cancel.store(true, Ordering::SeqCst);
    scheduler.shutdown().await?;
    wait_for_in_flight(&running).await;
    Ok(())
}

/// Block until no upload holds `running`.
async fn wait_for_in_flight(running: &Mutex<()>) {
    if running.try_lock().is_err() {
        tracing::info!("scheduler: waiting for in-flight upload to stop");
    }
    let _idle = running.lock().await;
}

/// Register the upload job on `config.upload_cron`.
async fn register_upload_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<AppConfig>,
    feed_path: PathBuf,
    cancel: Arc<AtomicBool>,
    running: Arc<Mutex<()>>,
) -> Result<(), JobSchedulerError> {
    let cron = config.upload_cron.clone();
    let feed_path = Arc::new(feed_path);

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = pool.clone();
        let config = Arc::clone(&config);
        let feed_path = Arc::clone(&feed_path);
        let cancel = Arc::clone(&cancel);
        let running = Arc::clone(&running);

        Box::pin(async move {
            let Ok(_guard) = running.try_lock() else {
                tracing::warn!("scheduler: previous upload still running; skipping tick");
                return;
            };
            tracing::info!(feed = %feed_path.display(), "scheduler: starting upload run");
            match run_orders_upload(
                &pool,
                &config,
                &feed_path,
                false,
                TriggerSource::Scheduler,
                &cancel,
            )
            .await
            {
                Ok(()) => tracing::info!("scheduler: upload run complete"),
                Err(e) => tracing::error!(error = %format!("{e:#}"), "scheduler: upload run failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered upload job");
    Ok(())
}
