//! One pass from raw feed lines to master and detail records.

use std::collections::BTreeSet;

use ordsync_core::{OrderDetail, RawOrderLine, ResolvedOrderLine};

use crate::catalog::CatalogIndex;
use crate::composition::{resolve_composition, ClusterComposition, Composition};
use crate::grouping::{group_lines, Cluster};
use crate::matcher::{match_composition, MatchOutcome};

/// Counters surfaced to the upload run and the alert payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    pub lines_received: usize,
    pub clusters: usize,
    pub bundles: usize,
    /// Lines dropped by the grouper for lack of a label.
    pub dropped_lines: usize,
    /// Bundles whose component counts did not divide evenly.
    pub inexact_bundles: usize,
    pub unresolved_singles: usize,
    pub unresolved_bundles: usize,
    pub unmapped_codes: BTreeSet<String>,
}

/// Everything the writer persists for one run.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub orders: Vec<ResolvedOrderLine>,
    pub details: Vec<OrderDetail>,
    pub dropped: Vec<RawOrderLine>,
    pub stats: ResolutionStats,
}

/// Group, compose and match `lines` against `index`.
///
/// Never fails: ambiguity is logged, counted in [`ResolutionStats`], and
/// carried as `None` product ids.
#[must_use]
pub fn resolve_orders(index: &CatalogIndex, lines: Vec<RawOrderLine>) -> Resolution {
    let mut stats = ResolutionStats {
        lines_received: lines.len(),
        ..ResolutionStats::default()
    };

    let grouped = group_lines(lines);
    stats.dropped_lines = grouped.dropped.len();
    stats.clusters = grouped.clusters.len();

    let mut orders = Vec::with_capacity(grouped.clusters.len());
    let mut details = Vec::with_capacity(stats.lines_received);

    for cluster in grouped.clusters {
        let composed = resolve_composition(index, &cluster);
        let parent_product_id = resolve_parent(index, &cluster, &composed, &mut stats);
        stats
            .unmapped_codes
            .extend(composed.unmapped_codes.iter().cloned());

        let (order, cluster_details) = build_records(cluster, composed, parent_product_id);
        orders.push(order);
        details.extend(cluster_details);
    }

    tracing::info!(
        lines = stats.lines_received,
        clusters = stats.clusters,
        bundles = stats.bundles,
        dropped_lines = stats.dropped_lines,
        inexact_bundles = stats.inexact_bundles,
        unresolved_singles = stats.unresolved_singles,
        unresolved_bundles = stats.unresolved_bundles,
        unmapped_codes = stats.unmapped_codes.len(),
        "order lines resolved"
    );

    Resolution {
        orders,
        details,
        dropped: grouped.dropped,
        stats,
    }
}

fn resolve_parent(
    index: &CatalogIndex,
    cluster: &Cluster,
    composed: &ClusterComposition,
    stats: &mut ResolutionStats,
) -> Option<i64> {
    let representative = &cluster.lines()[composed.representative];

    match &composed.composition {
        Composition::Single { product_id } => {
            if product_id.is_none() {
                stats.unresolved_singles += 1;
                tracing::warn!(
                    line_id = %representative.line_id,
                    component_code = %representative.component_code,
                    "single item has no catalog product"
                );
            }
            *product_id
        }
        Composition::Bundle { .. } => {
            stats.bundles += 1;
            if !composed.composition.is_exact() {
                stats.inexact_bundles += 1;
            }
            let per_unit = composed.composition.per_unit_counts();
            match match_composition(index, &per_unit) {
                MatchOutcome::Matched {
                    parent_product_id, ..
                } => Some(parent_product_id),
                MatchOutcome::Unresolved(reason) => {
                    stats.unresolved_bundles += 1;
                    tracing::warn!(
                        line_id = %representative.line_id,
                        order_id = %cluster.order_id(),
                        reason = %reason,
                        "bundle has no matching BOM parent"
                    );
                    None
                }
            }
        }
    }
}

fn build_records(
    cluster: Cluster,
    composed: ClusterComposition,
    parent_product_id: Option<i64>,
) -> (ResolvedOrderLine, Vec<OrderDetail>) {
    let is_bundle = composed.composition.is_bundle();
    let normalization_exact = composed.composition.is_exact();
    let composition = composed.composition.per_unit_counts();

    let lines = cluster.into_lines();
    let representative = &lines[composed.representative];

    let order = ResolvedOrderLine {
        representative_line_id: representative.line_id.clone(),
        order_id: representative.order_id.clone(),
        mall_product_id: representative.mall_product_id.clone(),
        parent_product_id,
        is_bundle,
        sale_count: composed.sale_count,
        composition,
        normalization_exact,
        unit_pay_amount: representative.unit_pay_amount,
        delivery_cost: representative.delivery_cost,
        carrier: representative.carrier.clone(),
        invoice_no: representative.invoice_no.clone(),
        brand: representative.brand.clone(),
        confirmed_at: representative.confirmed_at,
    };

    let representative_line_id = order.representative_line_id.clone();
    let details = lines
        .into_iter()
        .zip(composed.line_products)
        .map(|(line, component_product_id)| OrderDetail {
            set_tag: line.tag(),
            line_id: line.line_id,
            representative_line_id: representative_line_id.clone(),
            order_id: line.order_id,
            component_code: line.component_code,
            component_product_id,
            sale_count: line.sale_count,
            unit_pay_amount: line.unit_pay_amount,
            group_label: line.group_label,
        })
        .collect();

    (order, details)
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
