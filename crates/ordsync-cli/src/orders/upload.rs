use std::path::Path;
use std::sync::atomic::AtomicBool;

use anyhow::Context;
use ordsync_core::AppConfig;
use ordsync_db::{DbError, RetryPolicy, RunCounts, TriggerSource, UpsertSummary, WriteOptions};
use ordsync_resolver::{
    resolve_orders, CatalogIndex, CatalogLoadError, Resolution, ResolutionStats,
};

use super::alert;
use super::feed::read_feed;
use crate::fail_run_best_effort;

/// Resolve the feed at `path` and, unless `dry_run`, write it under a new
/// upload run, audit the run and emit the alert payload.
///
/// A failed mapping audit is logged and skips alerting; the run still
/// counts as succeeded.
///
/// # Errors
///
/// Returns an error if the feed cannot be read, the catalog cannot be
/// loaded, or the write fails. Once a run exists it is marked failed first.
pub(crate) async fn run_orders_upload(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    path: &Path,
    dry_run: bool,
    trigger: TriggerSource,
    cancel: &AtomicBool,
) -> anyhow::Result<()> {
    let lines = read_feed(path)?;

    if dry_run {
        let resolution = resolve_against_catalog(pool, config, lines).await?;
        print_dry_run(&resolution.stats);
        return Ok(());
    }

    let source_file = path.display().to_string();
    let run = ordsync_db::create_upload_run(pool, trigger, Some(&source_file)).await?;
    if let Err(e) = ordsync_db::start_upload_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, format!("{e:#}")).await;
        return Err(e.into());
    }
    tracing::info!(run_id = run.id, %trigger, file = %source_file, "upload run started");

    let written = async {
        let resolution = resolve_against_catalog(pool, config, lines).await?;
        let summary = ordsync_db::upsert_resolution(
            pool,
            run.id,
            &resolution.orders,
            &resolution.details,
            WriteOptions::from_app_config(config),
            cancel,
        )
        .await?;
        anyhow::Ok((resolution, summary))
    }
    .await;

    let (resolution, summary) = match written {
        Ok(pair) => pair,
        Err(err) => {
            fail_run_best_effort(pool, run.id, format!("{err:#}")).await;
            return Err(err);
        }
    };

    let counts = run_counts(&resolution.stats, &summary);
    if let Err(err) = ordsync_db::complete_upload_run(pool, run.id, counts).await {
        fail_run_best_effort(pool, run.id, format!("{err:#}")).await;
        return Err(err.into());
    }

    match ordsync_db::audit_mapping_failures(pool, run.id).await {
        Ok(audit) => {
            let payload = alert::build_alert_payload(run.id, &resolution.stats, &summary, &audit);
            alert::emit_alert(&payload, alert::needs_attention(&resolution.stats, &audit));
        }
        Err(err) => {
            tracing::error!(
                run_id = run.id,
                error = %err,
                "mapping audit failed; skipping alert"
            );
        }
    }

    println!(
        "upload run {}: {} orders ({} inserted, {} updated), {} detail rows, {} lines dropped",
        run.id,
        resolution.orders.len(),
        summary.masters_inserted,
        summary.masters_updated,
        summary.details_inserted + summary.details_updated,
        resolution.stats.dropped_lines
    );
    Ok(())
}

async fn resolve_against_catalog(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    lines: Vec<ordsync_core::RawOrderLine>,
) -> anyhow::Result<Resolution> {
    let index = load_catalog_index(pool, RetryPolicy::from_app_config(config))
        .await
        .context("loading catalog")?;
    Ok(resolve_orders(&index, lines))
}

/// Read the catalog from the store and build the run's lookup index.
///
/// # Errors
///
/// Returns [`CatalogLoadError::Unreachable`] if the store read fails after
/// retries, or the [`CatalogIndex::build`] error for an unusable catalog.
pub(crate) async fn load_catalog_index(
    pool: &sqlx::PgPool,
    retry: RetryPolicy,
) -> Result<CatalogIndex, CatalogLoadError> {
    let snapshot = ordsync_db::load_catalog_snapshot(pool, retry)
        .await
        .map_err(store_unreachable)?;
    CatalogIndex::build(snapshot)
}

fn store_unreachable(err: DbError) -> CatalogLoadError {
    CatalogLoadError::Unreachable(Box::new(err))
}

fn print_dry_run(stats: &ResolutionStats) {
    println!(
        "dry-run: {} lines -> {} orders ({} bundles), {} dropped, {} inexact bundles",
        stats.lines_received,
        stats.clusters,
        stats.bundles,
        stats.dropped_lines,
        stats.inexact_bundles
    );
    println!(
        "dry-run: {} unresolved singles, {} unresolved bundles",
        stats.unresolved_singles, stats.unresolved_bundles
    );
    if !stats.unmapped_codes.is_empty() {
        let codes: Vec<&str> = stats.unmapped_codes.iter().map(String::as_str).collect();
        println!("dry-run: unmapped codes: {}", codes.join(", "));
    }
}

fn run_counts(stats: &ResolutionStats, summary: &UpsertSummary) -> RunCounts {
    RunCounts {
        lines_received: saturating_i32(stats.lines_received),
        lines_dropped: saturating_i32(stats.dropped_lines),
        records_written: saturating_i32(summary.records_written()),
    }
}

fn saturating_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_counts_come_from_stats_and_summary() {
        let stats = ResolutionStats {
            lines_received: 12,
            dropped_lines: 2,
            ..ResolutionStats::default()
        };
        let summary = UpsertSummary {
            masters_inserted: 3,
            details_updated: 10,
            ..UpsertSummary::default()
        };

        assert_eq!(
            run_counts(&stats, &summary),
            RunCounts {
                lines_received: 12,
                lines_dropped: 2,
                records_written: 13,
            }
        );
    }

    #[test]
    fn counts_saturate_instead_of_wrapping() {
        assert_eq!(saturating_i32(usize::MAX), i32::MAX);
    }

    #[test]
    fn store_failure_becomes_unreachable_catalog() {
        let err = store_unreachable(DbError::Sqlx(sqlx::Error::PoolTimedOut));

        assert!(matches!(err, CatalogLoadError::Unreachable(_)));
        assert!(err.to_string().starts_with("catalog store unreachable"));
    }

    #[tokio::test]
    async fn unreachable_store_fails_catalog_load() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_secs(1))
            .connect_lazy("postgres://ordsync@127.0.0.1:1/ordsync")
            .expect("lazy pool");

        let err = load_catalog_index(&pool, RetryPolicy::none())
            .await
            .expect_err("nothing listens on port 1");

        assert!(matches!(err, CatalogLoadError::Unreachable(_)));
    }
}
