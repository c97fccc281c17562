//! Post-write mapping-failure counts for one upload run. Read-only.

use sqlx::PgPool;

use crate::DbError;

/// Cap on the sample of unmapped component codes returned with an audit.
pub const SAMPLE_CODE_LIMIT: i64 = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingAudit {
    pub upload_run_id: i64,
    /// Untagged detail rows whose component code has no product.
    pub unmapped_singles: i64,
    /// Masters with no parent product whose cluster has an anchor row.
    pub unmapped_bundles: i64,
    /// Up to [`SAMPLE_CODE_LIMIT`] distinct unmapped component codes.
    pub sample_codes: Vec<String>,
}

impl MappingAudit {
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.unmapped_singles > 0 || self.unmapped_bundles > 0
    }
}

/// Count mapping failures written by `upload_run_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn audit_mapping_failures(
    pool: &PgPool,
    upload_run_id: i64,
) -> Result<MappingAudit, DbError> {
    let (unmapped_singles, unmapped_bundles) = sqlx::query_as::<_, (i64, i64)>(
        "SELECT \
             (SELECT COUNT(*) FROM sabangnet_order_details d \
              WHERE d.upload_run_id = $1 \
                AND d.set_tag IS NULL \
                AND d.component_product_id IS NULL), \
             (SELECT COUNT(*) FROM sabangnet_orders o \
              WHERE o.upload_run_id = $1 \
                AND o.parent_product_id IS NULL \
                AND EXISTS ( \
                    SELECT 1 FROM sabangnet_order_details d \
                    WHERE d.representative_line_id = o.representative_line_id \
                      AND d.set_tag = 'anchor'))",
    )
    .bind(upload_run_id)
    .fetch_one(pool)
    .await?;

    let sample_codes = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT component_code FROM sabangnet_order_details \
         WHERE upload_run_id = $1 AND component_product_id IS NULL \
         ORDER BY component_code \
         LIMIT $2",
    )
    .bind(upload_run_id)
    .bind(SAMPLE_CODE_LIMIT)
    .fetch_all(pool)
    .await?;

    let audit = MappingAudit {
        upload_run_id,
        unmapped_singles,
        unmapped_bundles,
        sample_codes,
    };

    if audit.has_failures() {
        tracing::warn!(
            upload_run_id,
            unmapped_singles,
            unmapped_bundles,
            "mapping failures found"
        );
    }

    Ok(audit)
}
