//! Order-to-catalog resolution for the Sabangnet order upload.
//!
//! Raw order lines are grouped into commercial lines ([`grouping`]), each
//! group is classified as a single item or a bundle and normalized to a
//! per-unit composition ([`composition`]), and bundle compositions are
//! matched against the bill of materials ([`matcher`]). [`pipeline`] runs
//! the three stages against a [`CatalogIndex`] loaded once per run.
//!
//! Everything here is synchronous and free of I/O; loading the catalog and
//! persisting results live in `ordsync-db`.

pub mod catalog;
pub mod composition;
pub mod error;
pub mod grouping;
pub mod matcher;
pub mod pipeline;

#[cfg(test)]
mod test_support;

pub use catalog::CatalogIndex;
pub use composition::{resolve_composition, ClusterComposition, Composition, NormalizedCount};
pub use error::CatalogLoadError;
pub use grouping::{cmp_line_ids, group_lines, Cluster, GroupingOutcome};
pub use matcher::{match_composition, packaging_combinations, MatchOutcome, UnresolvedReason};
pub use pipeline::{resolve_orders, Resolution, ResolutionStats};
