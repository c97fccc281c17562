//! Classifying a cluster as a single item or a bundle and normalizing bundle
//! component counts to one bundle unit.

use std::collections::BTreeMap;

use ordsync_core::SetTag;

use crate::catalog::CatalogIndex;
use crate::grouping::Cluster;

/// Result of dividing a raw component count by the number of bundle units.
///
/// `value` is the floor of the division; `exact` is `false` when there was a
/// remainder, so callers can warn or fail without recomputing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedCount {
    pub value: i32,
    pub exact: bool,
}

impl NormalizedCount {
    /// Divide `raw` by `units`. `units` must be positive.
    #[must_use]
    pub fn divide(raw: i32, units: i32) -> Self {
        debug_assert!(units > 0, "bundle unit count must be positive");
        Self {
            value: raw.div_euclid(units),
            exact: raw.rem_euclid(units) == 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Composition {
    /// No anchor row: the representative row's product, if its code is known.
    Single { product_id: Option<i64> },
    /// At least one anchor row.
    Bundle {
        anchor_count: i32,
        components: BTreeMap<i64, NormalizedCount>,
    },
}

impl Composition {
    #[must_use]
    pub fn is_bundle(&self) -> bool {
        matches!(self, Composition::Bundle { .. })
    }

    /// Per-unit component counts, as looked up in the BOM. Empty for singles.
    #[must_use]
    pub fn per_unit_counts(&self) -> BTreeMap<i64, i32> {
        match self {
            Composition::Single { .. } => BTreeMap::new(),
            Composition::Bundle { components, .. } => components
                .iter()
                .map(|(&product_id, count)| (product_id, count.value))
                .collect(),
        }
    }

    /// `false` if any bundle component count had a remainder.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        match self {
            Composition::Single { .. } => true,
            Composition::Bundle { components, .. } => components.values().all(|c| c.exact),
        }
    }
}

/// Composition of one cluster plus what the writer needs per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterComposition {
    /// Index into [`Cluster::lines`] of the row that represents the cluster.
    pub representative: usize,
    pub composition: Composition,
    /// Units sold for the whole commercial line.
    pub sale_count: i32,
    /// Product resolved from each row's component code, aligned with
    /// [`Cluster::lines`].
    pub line_products: Vec<Option<i64>>,
    /// Component codes of rows whose packaging lookup failed.
    pub unmapped_codes: Vec<String>,
}

/// Decide single vs bundle for `cluster` and normalize its composition.
#[must_use]
pub fn resolve_composition(index: &CatalogIndex, cluster: &Cluster) -> ClusterComposition {
    let lines = cluster.lines();
    let line_products: Vec<Option<i64>> = lines
        .iter()
        .map(|l| index.product_for_packaging(l.component_code.trim()))
        .collect();
    let unmapped_codes: Vec<String> = lines
        .iter()
        .zip(&line_products)
        .filter(|(_, product)| product.is_none())
        .map(|(l, _)| l.component_code.clone())
        .collect();

    let first_anchor = lines.iter().position(|l| l.tag() == SetTag::Anchor);

    let Some(representative) = first_anchor else {
        return ClusterComposition {
            representative: 0,
            composition: Composition::Single {
                product_id: line_products.first().copied().flatten(),
            },
            sale_count: lines.first().map_or(0, |l| l.sale_count),
            line_products,
            unmapped_codes,
        };
    };

    let anchor_count = lines.iter().filter(|l| l.tag() == SetTag::Anchor).count();
    let anchor_count = i32::try_from(anchor_count).unwrap_or(i32::MAX);

    let mut raw_counts: BTreeMap<i64, i32> = BTreeMap::new();
    for (line, product) in lines.iter().zip(&line_products) {
        if !line.tag().is_bundle_part() {
            continue;
        }
        if let Some(product_id) = product {
            *raw_counts.entry(*product_id).or_insert(0) += 1;
        }
    }

    let components: BTreeMap<i64, NormalizedCount> = raw_counts
        .into_iter()
        .map(|(product_id, raw)| (product_id, NormalizedCount::divide(raw, anchor_count)))
        .collect();

    for (product_id, count) in components.iter().filter(|(_, c)| !c.exact) {
        tracing::warn!(
            order_id = %cluster.order_id(),
            line_id = %lines[representative].line_id,
            product_id,
            anchor_count,
            per_unit = count.value,
            "bundle component count does not divide evenly by anchor count; truncated"
        );
    }

    ClusterComposition {
        representative,
        composition: Composition::Bundle {
            anchor_count,
            components,
        },
        sale_count: anchor_count,
        line_products,
        unmapped_codes,
    }
}

#[cfg(test)]
#[path = "composition_test.rs"]
mod tests;
