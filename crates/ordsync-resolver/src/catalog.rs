//! In-memory catalog lookups built once per run.

use std::collections::{hash_map::Entry, BTreeMap, HashMap};

use ordsync_core::CatalogSnapshot;

use crate::error::CatalogLoadError;

/// Child composition of a BOM parent: `child packaging id -> quantity`.
pub type ChildComposition = BTreeMap<String, i32>;

/// Read-only packaging and BOM lookup tables for one run.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    product_by_packaging: HashMap<String, i64>,
    /// Sorted, de-duplicated packaging ids per product.
    packagings_by_product: HashMap<i64, Vec<String>>,
    children_by_parent: HashMap<String, ChildComposition>,
    /// Parents sharing a child composition, in load order.
    parents_by_children: HashMap<ChildComposition, Vec<String>>,
}

impl CatalogIndex {
    /// Build the lookup tables from a catalog snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogLoadError::Empty`] if the snapshot has no packagings
    /// or no BOM edges, [`CatalogLoadError::ConflictingPackaging`] if one
    /// packaging id is owned by two products, and
    /// [`CatalogLoadError::DanglingParent`] if a BOM parent is not a known
    /// packaging.
    pub fn build(snapshot: CatalogSnapshot) -> Result<Self, CatalogLoadError> {
        if snapshot.packagings.is_empty() {
            return Err(CatalogLoadError::Empty("product_packagings"));
        }
        if snapshot.bom_edges.is_empty() {
            return Err(CatalogLoadError::Empty("bom_edges"));
        }

        let mut product_by_packaging = HashMap::with_capacity(snapshot.packagings.len());
        let mut packagings_by_product: HashMap<i64, Vec<String>> = HashMap::new();

        for unit in snapshot.packagings {
            match product_by_packaging.entry(unit.packaging_id.clone()) {
                Entry::Occupied(existing) => {
                    if *existing.get() != unit.product_id {
                        return Err(CatalogLoadError::ConflictingPackaging {
                            packaging_id: unit.packaging_id,
                            first: *existing.get(),
                            second: unit.product_id,
                        });
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(unit.product_id);
                    packagings_by_product
                        .entry(unit.product_id)
                        .or_default()
                        .push(unit.packaging_id);
                }
            }
        }
        for codes in packagings_by_product.values_mut() {
            codes.sort_unstable();
        }

        let mut parent_order: Vec<String> = Vec::new();
        let mut children_by_parent: HashMap<String, ChildComposition> = HashMap::new();
        for edge in snapshot.bom_edges {
            if !product_by_packaging.contains_key(&edge.parent_packaging_id) {
                return Err(CatalogLoadError::DanglingParent(edge.parent_packaging_id));
            }
            let children = match children_by_parent.entry(edge.parent_packaging_id) {
                Entry::Occupied(slot) => slot.into_mut(),
                Entry::Vacant(slot) => {
                    parent_order.push(slot.key().clone());
                    slot.insert(ChildComposition::new())
                }
            };
            children.insert(edge.child_packaging_id, edge.quantity);
        }

        let mut parents_by_children: HashMap<ChildComposition, Vec<String>> = HashMap::new();
        for parent in parent_order {
            if let Some(children) = children_by_parent.get(&parent) {
                parents_by_children
                    .entry(children.clone())
                    .or_default()
                    .push(parent);
            }
        }

        let index = Self {
            product_by_packaging,
            packagings_by_product,
            children_by_parent,
            parents_by_children,
        };
        tracing::info!(
            packagings = index.packaging_count(),
            products = index.packagings_by_product.len(),
            bom_parents = index.bom_parent_count(),
            "catalog index built"
        );
        Ok(index)
    }

    /// Product owning `packaging_id`, if the code is known.
    #[must_use]
    pub fn product_for_packaging(&self, packaging_id: &str) -> Option<i64> {
        self.product_by_packaging.get(packaging_id).copied()
    }

    /// All packaging ids of a product, sorted. Empty for unknown products.
    #[must_use]
    pub fn packagings_for_product(&self, product_id: i64) -> &[String] {
        self.packagings_by_product
            .get(&product_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Child composition of a BOM parent packaging.
    #[must_use]
    pub fn children_of(&self, parent_packaging_id: &str) -> Option<&ChildComposition> {
        self.children_by_parent.get(parent_packaging_id)
    }

    /// Parent packagings whose children are exactly `children`, in load order.
    #[must_use]
    pub fn parents_with_children(&self, children: &ChildComposition) -> &[String] {
        self.parents_by_children
            .get(children)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn packaging_count(&self) -> usize {
        self.product_by_packaging.len()
    }

    #[must_use]
    pub fn bom_parent_count(&self) -> usize {
        self.children_by_parent.len()
    }
}

#[cfg(test)]
mod tests {
    use ordsync_core::{BomEdge, PackagingUnit};

    use super::*;

    fn unit(code: &str, product_id: i64) -> PackagingUnit {
        PackagingUnit {
            packaging_id: code.to_string(),
            product_id,
        }
    }

    fn edge(parent: &str, child: &str, quantity: i32) -> BomEdge {
        BomEdge {
            parent_packaging_id: parent.to_string(),
            child_packaging_id: child.to_string(),
            quantity,
        }
    }

    fn snapshot() -> CatalogSnapshot {
        CatalogSnapshot {
            packagings: vec![
                unit("A-2", 1),
                unit("A-1", 1),
                unit("B-1", 2),
                unit("SET-1", 100),
                unit("SET-2", 101),
            ],
            bom_edges: vec![
                edge("SET-1", "A-1", 1),
                edge("SET-1", "B-1", 2),
                edge("SET-2", "A-1", 1),
                edge("SET-2", "B-1", 2),
            ],
        }
    }

    #[test]
    fn build_indexes_packagings_both_ways() {
        let index = CatalogIndex::build(snapshot()).unwrap();
        assert_eq!(index.product_for_packaging("A-2"), Some(1));
        assert_eq!(index.product_for_packaging("nope"), None);
        assert_eq!(index.packagings_for_product(1), ["A-1", "A-2"]);
        assert!(index.packagings_for_product(999).is_empty());
        assert_eq!(index.packaging_count(), 5);
    }

    #[test]
    fn build_flattens_bom_by_parent() {
        let index = CatalogIndex::build(snapshot()).unwrap();
        let children = index.children_of("SET-1").unwrap();
        assert_eq!(children.get("A-1"), Some(&1));
        assert_eq!(children.get("B-1"), Some(&2));
        assert_eq!(index.bom_parent_count(), 2);
    }

    #[test]
    fn parents_with_children_keeps_load_order() {
        let index = CatalogIndex::build(snapshot()).unwrap();
        let key: ChildComposition = [("A-1".to_string(), 1), ("B-1".to_string(), 2)]
            .into_iter()
            .collect();
        assert_eq!(index.parents_with_children(&key), ["SET-1", "SET-2"]);
    }

    #[test]
    fn empty_packagings_is_fatal() {
        let err = CatalogIndex::build(CatalogSnapshot::default()).unwrap_err();
        assert!(matches!(err, CatalogLoadError::Empty("product_packagings")));
    }

    #[test]
    fn empty_bom_is_fatal() {
        let snapshot = CatalogSnapshot {
            packagings: vec![unit("A-1", 1)],
            bom_edges: vec![],
        };
        let err = CatalogIndex::build(snapshot).unwrap_err();
        assert!(matches!(err, CatalogLoadError::Empty("bom_edges")));
    }

    #[test]
    fn conflicting_packaging_is_fatal() {
        let mut snapshot = snapshot();
        snapshot.packagings.push(unit("A-1", 2));
        let err = CatalogIndex::build(snapshot).unwrap_err();
        assert!(matches!(
            err,
            CatalogLoadError::ConflictingPackaging { ref packaging_id, first: 1, second: 2 }
                if packaging_id == "A-1"
        ));
    }

    #[test]
    fn repeated_identical_packaging_is_tolerated() {
        let mut snapshot = snapshot();
        snapshot.packagings.push(unit("A-1", 1));
        let index = CatalogIndex::build(snapshot).unwrap();
        assert_eq!(index.packagings_for_product(1), ["A-1", "A-2"]);
    }

    #[test]
    fn dangling_parent_is_fatal() {
        let mut snapshot = snapshot();
        snapshot.bom_edges.push(edge("GHOST", "A-1", 1));
        let err = CatalogIndex::build(snapshot).unwrap_err();
        assert!(matches!(err, CatalogLoadError::DanglingParent(ref p) if p == "GHOST"));
    }
}
