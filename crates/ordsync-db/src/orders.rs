//! Upsert writer for `sabangnet_orders` (masters) and
//! `sabangnet_order_details` (one row per raw feed row).
//!
//! Masters are written in batches together with their detail rows; each
//! batch is one transaction. A failed batch is rolled back and retried while
//! the error is transient, then surfaced as [`DbError::WriteBatch`]. Earlier
//! batches stay committed. Re-running the same input updates every row and
//! inserts none.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use ordsync_core::{AppConfig, OrderDetail, ResolvedOrderLine};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{PgConnection, PgPool};

use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::DbError;

const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Masters per transaction. Zero is treated as one.
    pub batch_size: usize,
    pub retry: RetryPolicy,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::default(),
        }
    }
}

impl WriteOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            batch_size: config.write_batch_size,
            retry: RetryPolicy::from_app_config(config),
        }
    }
}

/// Per-call insert/update counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub masters_inserted: usize,
    pub masters_updated: usize,
    pub details_inserted: usize,
    pub details_updated: usize,
    pub batches_committed: usize,
    /// Raw component codes written without a resolved product.
    pub unmapped_codes: BTreeSet<String>,
}

impl UpsertSummary {
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.masters_inserted + self.masters_updated + self.details_inserted + self.details_updated
    }
}

/// One transaction's worth of rows.
#[derive(Debug)]
struct Batch<'a> {
    masters: &'a [ResolvedOrderLine],
    details: Vec<&'a OrderDetail>,
}

#[derive(Debug, Clone, Copy, Default)]
struct BatchCounts {
    masters_inserted: usize,
    masters_updated: usize,
    details_inserted: usize,
    details_updated: usize,
}

/// Persist resolved masters and their details under `upload_run_id`.
///
/// `cancel` is checked before each batch; once set, no further batch is
/// started and [`DbError::Cancelled`] reports how many were committed.
///
/// # Errors
///
/// Returns [`DbError::OrphanDetail`] before writing anything if a detail
/// points at a master not in `orders`, [`DbError::WriteBatch`] if a batch
/// fails, or [`DbError::Cancelled`].
pub async fn upsert_resolution(
    pool: &PgPool,
    upload_run_id: i64,
    orders: &[ResolvedOrderLine],
    details: &[OrderDetail],
    options: WriteOptions,
    cancel: &AtomicBool,
) -> Result<UpsertSummary, DbError> {
    let batches = plan_batches(orders, details, options.batch_size)?;
    let total = batches.len();
    let mut summary = UpsertSummary::default();

    for (i, batch) in batches.iter().enumerate() {
        if cancel.load(Ordering::SeqCst) {
            tracing::warn!(
                upload_run_id,
                committed = summary.batches_committed,
                remaining = total - i,
                "write cancelled between batches"
            );
            return Err(DbError::Cancelled {
                committed_batches: summary.batches_committed,
            });
        }

        let masters = batch.masters;
        let batch_details = batch.details.as_slice();
        let counts = retry_with_backoff(options.retry, "order write batch", move || {
            write_batch(pool, upload_run_id, masters, batch_details)
        })
        .await
        .map_err(|source| DbError::WriteBatch {
            batch: i + 1,
            committed: summary.batches_committed,
            source,
        })?;

        summary.masters_inserted += counts.masters_inserted;
        summary.masters_updated += counts.masters_updated;
        summary.details_inserted += counts.details_inserted;
        summary.details_updated += counts.details_updated;
        summary.batches_committed += 1;
        summary.unmapped_codes.extend(
            batch
                .details
                .iter()
                .filter(|d| d.component_product_id.is_none())
                .map(|d| d.component_code.clone()),
        );

        tracing::debug!(
            upload_run_id,
            batch = i + 1,
            total,
            masters = masters.len(),
            details = batch_details.len(),
            "write batch committed"
        );
    }

    tracing::info!(
        upload_run_id,
        masters_inserted = summary.masters_inserted,
        masters_updated = summary.masters_updated,
        details_inserted = summary.details_inserted,
        details_updated = summary.details_updated,
        batches = summary.batches_committed,
        "orders written"
    );

    Ok(summary)
}

/// Split masters into chunks of `batch_size` and attach each master's
/// details to the chunk that holds it.
fn plan_batches<'a>(
    orders: &'a [ResolvedOrderLine],
    details: &'a [OrderDetail],
    batch_size: usize,
) -> Result<Vec<Batch<'a>>, DbError> {
    let known: HashSet<&str> = orders
        .iter()
        .map(|o| o.representative_line_id.as_str())
        .collect();

    let mut by_master: HashMap<&str, Vec<&OrderDetail>> = HashMap::new();
    for detail in details {
        let key = detail.representative_line_id.as_str();
        if !known.contains(key) {
            return Err(DbError::OrphanDetail {
                line_id: detail.line_id.clone(),
                representative_line_id: detail.representative_line_id.clone(),
            });
        }
        by_master.entry(key).or_default().push(detail);
    }

    let batches = orders
        .chunks(batch_size.max(1))
        .map(|masters| Batch {
            masters,
            details: masters
                .iter()
                .filter_map(|m| by_master.get(m.representative_line_id.as_str()))
                .flatten()
                .copied()
                .collect(),
        })
        .collect();

    Ok(batches)
}

async fn write_batch(
    pool: &PgPool,
    upload_run_id: i64,
    masters: &[ResolvedOrderLine],
    details: &[&OrderDetail],
) -> Result<BatchCounts, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let master_flags = upsert_masters(&mut tx, upload_run_id, masters).await?;
    let detail_flags = upsert_details(&mut tx, upload_run_id, details).await?;

    tx.commit().await?;

    let (masters_inserted, masters_updated) = split_flags(&master_flags);
    let (details_inserted, details_updated) = split_flags(&detail_flags);
    Ok(BatchCounts {
        masters_inserted,
        masters_updated,
        details_inserted,
        details_updated,
    })
}

/// `(inserted, updated)` from `RETURNING (xmax = 0)` flags.
fn split_flags(flags: &[bool]) -> (usize, usize) {
    let inserted = flags.iter().filter(|&&is_new| is_new).count();
    (inserted, flags.len() - inserted)
}

fn composition_json(order: &ResolvedOrderLine) -> Value {
    Value::Object(
        order
            .composition
            .iter()
            .map(|(product_id, count)| (product_id.to_string(), Value::from(*count)))
            .collect(),
    )
}

async fn upsert_masters(
    conn: &mut PgConnection,
    upload_run_id: i64,
    masters: &[ResolvedOrderLine],
) -> Result<Vec<bool>, sqlx::Error> {
    if masters.is_empty() {
        return Ok(Vec::new());
    }

    let representative_line_ids: Vec<&str> = masters
        .iter()
        .map(|m| m.representative_line_id.as_str())
        .collect();
    let order_ids: Vec<&str> = masters.iter().map(|m| m.order_id.as_str()).collect();
    let mall_product_ids: Vec<&str> = masters.iter().map(|m| m.mall_product_id.as_str()).collect();
    let parent_product_ids: Vec<Option<i64>> =
        masters.iter().map(|m| m.parent_product_id).collect();
    let is_bundle: Vec<bool> = masters.iter().map(|m| m.is_bundle).collect();
    let sale_counts: Vec<i32> = masters.iter().map(|m| m.sale_count).collect();
    let compositions: Vec<Value> = masters.iter().map(composition_json).collect();
    let exact: Vec<bool> = masters.iter().map(|m| m.normalization_exact).collect();
    let unit_pay_amounts: Vec<Decimal> = masters.iter().map(|m| m.unit_pay_amount).collect();
    let delivery_costs: Vec<Decimal> = masters.iter().map(|m| m.delivery_cost).collect();
    let carriers: Vec<Option<&str>> = masters.iter().map(|m| m.carrier.as_deref()).collect();
    let invoice_nos: Vec<Option<&str>> = masters.iter().map(|m| m.invoice_no.as_deref()).collect();
    let brands: Vec<Option<&str>> = masters.iter().map(|m| m.brand.as_deref()).collect();
    let confirmed_at: Vec<_> = masters.iter().map(|m| m.confirmed_at).collect();

    sqlx::query_scalar::<_, bool>(
        "INSERT INTO sabangnet_orders \
             (representative_line_id, order_id, mall_product_id, parent_product_id, is_bundle, \
              sale_count, composition, normalization_exact, unit_pay_amount, delivery_cost, \
              carrier, invoice_no, brand, confirmed_at, upload_run_id) \
         SELECT r.*, $15::bigint \
         FROM UNNEST($1::text[], $2::text[], $3::text[], $4::bigint[], $5::bool[], \
                     $6::int4[], $7::jsonb[], $8::bool[], $9::numeric[], $10::numeric[], \
                     $11::text[], $12::text[], $13::text[], $14::timestamptz[]) AS r \
         ON CONFLICT (representative_line_id) DO UPDATE SET \
             order_id            = EXCLUDED.order_id, \
             mall_product_id     = EXCLUDED.mall_product_id, \
             parent_product_id   = EXCLUDED.parent_product_id, \
             is_bundle           = EXCLUDED.is_bundle, \
             sale_count          = EXCLUDED.sale_count, \
             composition         = EXCLUDED.composition, \
             normalization_exact = EXCLUDED.normalization_exact, \
             unit_pay_amount     = EXCLUDED.unit_pay_amount, \
             delivery_cost       = EXCLUDED.delivery_cost, \
             carrier             = EXCLUDED.carrier, \
             invoice_no          = EXCLUDED.invoice_no, \
             brand               = EXCLUDED.brand, \
             confirmed_at        = EXCLUDED.confirmed_at, \
             upload_run_id       = EXCLUDED.upload_run_id, \
             updated_at          = NOW() \
         RETURNING (xmax = 0) AS is_new",
    )
    .bind(representative_line_ids)
    .bind(order_ids)
    .bind(mall_product_ids)
    .bind(parent_product_ids)
    .bind(is_bundle)
    .bind(sale_counts)
    .bind(compositions)
    .bind(exact)
    .bind(unit_pay_amounts)
    .bind(delivery_costs)
    .bind(carriers)
    .bind(invoice_nos)
    .bind(brands)
    .bind(confirmed_at)
    .bind(upload_run_id)
    .fetch_all(&mut *conn)
    .await
}

async fn upsert_details(
    conn: &mut PgConnection,
    upload_run_id: i64,
    details: &[&OrderDetail],
) -> Result<Vec<bool>, sqlx::Error> {
    if details.is_empty() {
        return Ok(Vec::new());
    }

    let line_ids: Vec<&str> = details.iter().map(|d| d.line_id.as_str()).collect();
    let representative_line_ids: Vec<&str> = details
        .iter()
        .map(|d| d.representative_line_id.as_str())
        .collect();
    let order_ids: Vec<&str> = details.iter().map(|d| d.order_id.as_str()).collect();
    let component_codes: Vec<&str> = details.iter().map(|d| d.component_code.as_str()).collect();
    let component_product_ids: Vec<Option<i64>> =
        details.iter().map(|d| d.component_product_id).collect();
    let set_tags: Vec<Option<&str>> = details.iter().map(|d| d.set_tag.as_db_str()).collect();
    let sale_counts: Vec<i32> = details.iter().map(|d| d.sale_count).collect();
    let unit_pay_amounts: Vec<Decimal> = details.iter().map(|d| d.unit_pay_amount).collect();
    let group_labels: Vec<Option<&str>> = details.iter().map(|d| d.group_label.as_deref()).collect();

    sqlx::query_scalar::<_, bool>(
        "INSERT INTO sabangnet_order_details \
             (line_id, representative_line_id, order_id, component_code, component_product_id, \
              set_tag, sale_count, unit_pay_amount, group_label, upload_run_id) \
         SELECT r.*, $10::bigint \
         FROM UNNEST($1::text[], $2::text[], $3::text[], $4::text[], $5::bigint[], \
                     $6::text[], $7::int4[], $8::numeric[], $9::text[]) AS r \
         ON CONFLICT (line_id) DO UPDATE SET \
             representative_line_id = EXCLUDED.representative_line_id, \
             order_id               = EXCLUDED.order_id, \
             component_code         = EXCLUDED.component_code, \
             component_product_id   = EXCLUDED.component_product_id, \
             set_tag                = EXCLUDED.set_tag, \
             sale_count             = EXCLUDED.sale_count, \
             unit_pay_amount        = EXCLUDED.unit_pay_amount, \
             group_label            = EXCLUDED.group_label, \
             upload_run_id          = EXCLUDED.upload_run_id, \
             updated_at             = NOW() \
         RETURNING (xmax = 0) AS is_new",
    )
    .bind(line_ids)
    .bind(representative_line_ids)
    .bind(order_ids)
    .bind(component_codes)
    .bind(component_product_ids)
    .bind(set_tags)
    .bind(sale_counts)
    .bind(unit_pay_amounts)
    .bind(group_labels)
    .bind(upload_run_id)
    .fetch_all(&mut *conn)
    .await
}
