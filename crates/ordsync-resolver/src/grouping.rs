//! Partitioning raw order lines into commercial order lines.
//!
//! Pass 1 indexes lines by `(order_id, mall_product_id)` in first-appearance
//! order. Pass 2 turns each group into one or more immutable [`Cluster`]s:
//! a group with at most one line-opening row (untagged or anchor) is a
//! cluster as-is; a group with several is split by free-text label, and
//! rows without a label are dropped because they cannot be attributed.

use std::cmp::Ordering;
use std::collections::HashMap;

use ordsync_core::RawOrderLine;

/// Rows determined to represent one commercial order line.
///
/// Never empty. Lines are ordered by source `line_id` (numerically when the
/// id is all digits, see [`cmp_line_ids`]), so "the first row" does not
/// depend on feed order.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    order_id: String,
    mall_product_id: String,
    label: Option<String>,
    lines: Vec<RawOrderLine>,
}

impl Cluster {
    fn new(mut lines: Vec<RawOrderLine>, label: Option<String>) -> Option<Self> {
        let first = lines.first()?;
        let order_id = first.order_id.clone();
        let mall_product_id = first.mall_product_id.clone();
        lines.sort_by(|a, b| cmp_line_ids(&a.line_id, &b.line_id));
        Some(Self {
            order_id,
            mall_product_id,
            label,
            lines,
        })
    }

    #[must_use]
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    #[must_use]
    pub fn mall_product_id(&self) -> &str {
        &self.mall_product_id
    }

    /// Label the cluster was split on; `None` for unsplit groups.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    #[must_use]
    pub fn lines(&self) -> &[RawOrderLine] {
        &self.lines
    }

    #[must_use]
    pub fn into_lines(self) -> Vec<RawOrderLine> {
        self.lines
    }
}

/// Order source line ids: numeric ids by value ahead of all others, the rest
/// lexicographically.
#[must_use]
pub fn cmp_line_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Result of [`group_lines`].
#[derive(Debug, Clone, Default)]
pub struct GroupingOutcome {
    pub clusters: Vec<Cluster>,
    /// Lines of ambiguous groups that carried no label.
    pub dropped: Vec<RawOrderLine>,
}

/// Group raw lines into clusters.
///
/// Every input line ends up either in exactly one cluster or in
/// [`GroupingOutcome::dropped`].
#[must_use]
pub fn group_lines(lines: Vec<RawOrderLine>) -> GroupingOutcome {
    let mut outcome = GroupingOutcome::default();

    for group in index_by_order_product(lines) {
        let openers = group.iter().filter(|l| l.tag().opens_line()).count();
        if openers <= 1 {
            outcome.clusters.extend(Cluster::new(group, None));
        } else {
            split_by_label(group, &mut outcome);
        }
    }

    outcome
}

/// Pass 1: bucket lines by `(order_id, mall_product_id)`, keeping the order
/// in which each key first appears.
fn index_by_order_product(lines: Vec<RawOrderLine>) -> Vec<Vec<RawOrderLine>> {
    let mut slots: HashMap<(String, String), usize> = HashMap::new();
    let mut groups: Vec<Vec<RawOrderLine>> = Vec::new();

    for line in lines {
        let key = (line.order_id.clone(), line.mall_product_id.clone());
        let slot = *slots.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(line);
    }

    groups
}

/// Third-level split of a group holding several commercial lines.
fn split_by_label(group: Vec<RawOrderLine>, outcome: &mut GroupingOutcome) {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<(String, Vec<RawOrderLine>)> = Vec::new();

    for line in group {
        let Some(label) = line.label().map(str::to_owned) else {
            tracing::warn!(
                line_id = %line.line_id,
                order_id = %line.order_id,
                mall_product_id = %line.mall_product_id,
                "dropping order line: ambiguous group and no grouping label"
            );
            outcome.dropped.push(line);
            continue;
        };
        let slot = *slots.entry(label.clone()).or_insert_with(|| {
            buckets.push((label, Vec::new()));
            buckets.len() - 1
        });
        buckets[slot].1.push(line);
    }

    outcome.clusters.extend(
        buckets
            .into_iter()
            .filter_map(|(label, lines)| Cluster::new(lines, Some(label))),
    );
}

#[cfg(test)]
#[path = "grouping_test.rs"]
mod tests;
