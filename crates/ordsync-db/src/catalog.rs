//! Catalog snapshot load and development seeding.

use ordsync_core::{BomEdge, CatalogFile, CatalogSnapshot, PackagingUnit};
use sqlx::PgPool;

use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::DbError;

/// Read every packaging and BOM edge in one pass.
///
/// Rows come back in insertion order, which is the order the BOM matcher
/// uses to break ties between parents with the same child set.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] once retries of transient errors are exhausted.
pub async fn load_catalog_snapshot(
    pool: &PgPool,
    retry: RetryPolicy,
) -> Result<CatalogSnapshot, DbError> {
    let snapshot = retry_with_backoff(retry, "catalog snapshot", || fetch_snapshot(pool)).await?;

    tracing::debug!(
        packagings = snapshot.packagings.len(),
        bom_edges = snapshot.bom_edges.len(),
        "catalog snapshot loaded"
    );

    Ok(snapshot)
}

async fn fetch_snapshot(pool: &PgPool) -> Result<CatalogSnapshot, sqlx::Error> {
    let packagings = sqlx::query_as::<_, (String, i64)>(
        "SELECT packaging_id, product_id FROM product_packagings ORDER BY id",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(packaging_id, product_id)| PackagingUnit {
        packaging_id,
        product_id,
    })
    .collect();

    let bom_edges = sqlx::query_as::<_, (String, String, i32)>(
        "SELECT parent_packaging_id, child_packaging_id, quantity \
         FROM bom_edges ORDER BY id",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(parent_packaging_id, child_packaging_id, quantity)| BomEdge {
        parent_packaging_id,
        child_packaging_id,
        quantity,
    })
    .collect();

    Ok(CatalogSnapshot {
        packagings,
        bom_edges,
    })
}

/// Rows touched by [`seed_catalog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub products: usize,
    pub packagings: usize,
    pub bom_edges: usize,
}

/// Upsert products, packagings and BOM edges from a catalog fixture.
///
/// Everything runs inside a single transaction. A parent's child set is
/// replaced wholesale, so children removed from the file disappear.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails; nothing is
/// committed in that case.
pub async fn seed_catalog(pool: &PgPool, catalog: &CatalogFile) -> Result<SeedSummary, DbError> {
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();

    for product in &catalog.products {
        sqlx::query(
            "INSERT INTO products (id, name) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 updated_at = NOW()",
        )
        .bind(product.id)
        .bind(&product.name)
        .execute(&mut *tx)
        .await?;
        summary.products += 1;

        for code in &product.packagings {
            sqlx::query(
                "INSERT INTO product_packagings (packaging_id, product_id) VALUES ($1, $2) \
                 ON CONFLICT (packaging_id) DO UPDATE SET product_id = EXCLUDED.product_id",
            )
            .bind(code)
            .bind(product.id)
            .execute(&mut *tx)
            .await?;
            summary.packagings += 1;
        }
    }

    for edge in &catalog.bom {
        sqlx::query("DELETE FROM bom_edges WHERE parent_packaging_id = $1")
            .bind(&edge.parent)
            .execute(&mut *tx)
            .await?;

        for child in &edge.children {
            sqlx::query(
                "INSERT INTO bom_edges (parent_packaging_id, child_packaging_id, quantity) \
                 VALUES ($1, $2, $3)",
            )
            .bind(&edge.parent)
            .bind(&child.packaging)
            .bind(child.quantity)
            .execute(&mut *tx)
            .await?;
            summary.bom_edges += 1;
        }
    }

    tx.commit().await?;

    tracing::info!(
        products = summary.products,
        packagings = summary.packagings,
        bom_edges = summary.bom_edges,
        "catalog seeded"
    );

    Ok(summary)
}
