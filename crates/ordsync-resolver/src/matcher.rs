//! Matching a normalized bundle composition to a BOM parent product.
//!
//! A product may be shipped under several packaging codes, and the BOM is
//! keyed by packaging code, so every choice of one packaging per component
//! is tried. Combinations are produced lazily and the search stops at the
//! first combination whose `{packaging: count}` map equals a parent's child
//! set. When several parents share a child set, the first in load order
//! wins; uniqueness is not enforced.

use std::collections::BTreeMap;

use crate::catalog::{CatalogIndex, ChildComposition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The composition had no components (no component code was known).
    EmptyComposition,
    /// A component product has no packaging ids in the catalog.
    NoPackaging { product_id: i64 },
    /// Every packaging combination was tried without a BOM hit.
    NoMatchingBom { combinations_tried: usize },
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnresolvedReason::EmptyComposition => write!(f, "empty composition"),
            UnresolvedReason::NoPackaging { product_id } => {
                write!(f, "product {product_id} has no packaging")
            }
            UnresolvedReason::NoMatchingBom { combinations_tried } => write!(
                f,
                "no BOM parent after {combinations_tried} packaging combinations"
            ),
        }
    }
}

/// Outcome of [`match_composition`]. Unresolved is a value, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched {
        parent_product_id: i64,
        parent_packaging_id: String,
    },
    Unresolved(UnresolvedReason),
}

impl MatchOutcome {
    #[must_use]
    pub fn parent_product_id(&self) -> Option<i64> {
        match self {
            MatchOutcome::Matched {
                parent_product_id, ..
            } => Some(*parent_product_id),
            MatchOutcome::Unresolved(_) => None,
        }
    }
}

/// Lazy Cartesian product over per-component packaging choices.
///
/// Yields one packaging id per component, in component order. The first
/// component varies slowest. Yields nothing if any component has no choices.
#[derive(Debug, Clone)]
pub struct PackagingCombinations<'a> {
    choices: Vec<&'a [String]>,
    cursor: Vec<usize>,
    exhausted: bool,
}

/// Start enumerating combinations of `choices`.
#[must_use]
pub fn packaging_combinations(choices: Vec<&[String]>) -> PackagingCombinations<'_> {
    let exhausted = choices.is_empty() || choices.iter().any(|c| c.is_empty());
    PackagingCombinations {
        cursor: vec![0; choices.len()],
        choices,
        exhausted,
    }
}

impl<'a> Iterator for PackagingCombinations<'a> {
    type Item = Vec<&'a str>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let current = self
            .choices
            .iter()
            .copied()
            .zip(&self.cursor)
            .map(|(options, &i)| options[i].as_str())
            .collect();

        // Odometer step: bump the last position, carrying leftwards.
        let mut pos = self.cursor.len();
        loop {
            if pos == 0 {
                self.exhausted = true;
                break;
            }
            pos -= 1;
            self.cursor[pos] += 1;
            if self.cursor[pos] < self.choices[pos].len() {
                break;
            }
            self.cursor[pos] = 0;
        }

        Some(current)
    }
}

/// Resolve a per-unit composition (`product_id -> count`) to a parent product.
///
/// Pure function of the index and the composition: the same inputs always
/// give the same outcome.
#[must_use]
pub fn match_composition(index: &CatalogIndex, composition: &BTreeMap<i64, i32>) -> MatchOutcome {
    if composition.is_empty() {
        return MatchOutcome::Unresolved(UnresolvedReason::EmptyComposition);
    }

    let mut choices = Vec::with_capacity(composition.len());
    let mut counts = Vec::with_capacity(composition.len());
    for (&product_id, &count) in composition {
        let packagings = index.packagings_for_product(product_id);
        if packagings.is_empty() {
            return MatchOutcome::Unresolved(UnresolvedReason::NoPackaging { product_id });
        }
        choices.push(packagings);
        counts.push(count);
    }

    let mut tried = 0usize;
    for combination in packaging_combinations(choices) {
        tried += 1;
        let candidate: ChildComposition = combination
            .into_iter()
            .zip(&counts)
            .map(|(packaging, &count)| (packaging.to_owned(), count))
            .collect();

        let parent = index
            .parents_with_children(&candidate)
            .iter()
            .find_map(|p| index.product_for_packaging(p).map(|id| (p, id)));
        if let Some((parent_packaging_id, parent_product_id)) = parent {
            return MatchOutcome::Matched {
                parent_product_id,
                parent_packaging_id: parent_packaging_id.clone(),
            };
        }
    }

    MatchOutcome::Unresolved(UnresolvedReason::NoMatchingBom {
        combinations_tried: tried,
    })
}

#[cfg(test)]
#[path = "matcher_test.rs"]
mod tests;
