use std::collections::BTreeMap;

use ordsync_core::SetTag;

use super::*;
use crate::test_support::{catalog, labelled, line, tagged};

#[test]
fn single_item_resolves_to_its_product() {
    let mut row = line("L1", "O1", "X");
    row.sale_count = 3;

    let resolution = resolve_orders(&catalog(), vec![row]);

    assert_eq!(resolution.orders.len(), 1);
    let order = &resolution.orders[0];
    assert_eq!(order.representative_line_id, "L1");
    assert_eq!(order.parent_product_id, Some(10));
    assert_eq!(order.sale_count, 3);
    assert!(!order.is_bundle);
    assert!(order.composition.is_empty());

    assert_eq!(resolution.details.len(), 1);
    assert_eq!(resolution.details[0].component_product_id, Some(10));
    assert_eq!(resolution.details[0].set_tag, SetTag::Standalone);
    assert_eq!(resolution.stats.unresolved_singles, 0);
}

#[test]
fn bundle_resolves_through_bom() {
    let rows = vec![
        tagged("L1", "O1", "A-1", "anchor"),
        tagged("L2", "O1", "B-1", "member"),
        tagged("L3", "O1", "B-1", "member"),
    ];

    let resolution = resolve_orders(&catalog(), rows);

    assert_eq!(resolution.orders.len(), 1);
    let order = &resolution.orders[0];
    assert!(order.is_bundle);
    assert_eq!(order.parent_product_id, Some(100));
    assert_eq!(order.sale_count, 1);
    assert!(order.normalization_exact);
    let expected: BTreeMap<i64, i32> = [(1, 1), (2, 2)].into_iter().collect();
    assert_eq!(order.composition, expected);

    assert_eq!(resolution.details.len(), 3);
    assert!(resolution
        .details
        .iter()
        .all(|d| d.representative_line_id == "L1"));
    assert_eq!(resolution.stats.bundles, 1);
    assert_eq!(resolution.stats.unresolved_bundles, 0);
}

#[test]
fn bundle_without_bom_match_keeps_null_parent_and_counts_it() {
    let rows = vec![
        tagged("L1", "O1", "A-1", "anchor"),
        tagged("L2", "O1", "B-1", "member"),
        tagged("L3", "O1", "B-1", "member"),
        tagged("L4", "O1", "B-1", "member"),
    ];

    let resolution = resolve_orders(&catalog(), rows);

    assert_eq!(resolution.orders.len(), 1);
    assert_eq!(resolution.orders[0].parent_product_id, None);
    assert!(resolution.orders[0].is_bundle);
    assert_eq!(resolution.details.len(), 4);
    assert_eq!(resolution.stats.unresolved_bundles, 1);
}

#[test]
fn unknown_single_code_is_counted_and_reported() {
    let resolution = resolve_orders(&catalog(), vec![line("L1", "O1", "GHOST")]);

    assert_eq!(resolution.orders[0].parent_product_id, None);
    assert_eq!(resolution.details[0].component_product_id, None);
    assert_eq!(resolution.stats.unresolved_singles, 1);
    assert!(resolution.stats.unmapped_codes.contains("GHOST"));
}

#[test]
fn dropped_lines_are_counted_not_written() {
    let mut second = line("L2", "O1", "X");
    second.group_label = None;
    let rows = vec![
        labelled(line("L1", "O1", "X"), "Blue"),
        second,
        labelled(line("L3", "O1", "X"), "Red"),
    ];

    let resolution = resolve_orders(&catalog(), rows);

    assert_eq!(resolution.stats.lines_received, 3);
    assert_eq!(resolution.stats.dropped_lines, 1);
    assert_eq!(resolution.dropped.len(), 1);
    assert_eq!(resolution.dropped[0].line_id, "L2");
    assert_eq!(resolution.orders.len(), 2);
    assert!(resolution.details.iter().all(|d| d.line_id != "L2"));
}

#[test]
fn every_kept_line_gets_exactly_one_detail() {
    let rows = vec![
        line("L1", "O1", "X"),
        tagged("L2", "O2", "A-1", "anchor"),
        tagged("L3", "O2", "C-1", "member"),
        line("L4", "O3", "UNKNOWN"),
    ];

    let resolution = resolve_orders(&catalog(), rows);

    assert_eq!(resolution.stats.clusters, 3);
    assert_eq!(
        resolution.details.len() + resolution.stats.dropped_lines,
        resolution.stats.lines_received
    );
    let parents: Vec<Option<i64>> = resolution
        .orders
        .iter()
        .map(|o| o.parent_product_id)
        .collect();
    assert_eq!(parents, [Some(10), Some(101), None]);
}

#[test]
fn inexact_bundles_are_counted() {
    let rows = vec![
        labelled(tagged("L1", "O1", "A-1", "anchor"), "Set"),
        labelled(tagged("L2", "O1", "A-1", "anchor"), "Set"),
        labelled(tagged("L3", "O1", "C-1", "member"), "Set"),
    ];

    let resolution = resolve_orders(&catalog(), rows);

    assert_eq!(resolution.stats.inexact_bundles, 1);
    assert!(!resolution.orders[0].normalization_exact);
    assert_eq!(resolution.orders[0].sale_count, 2);
}

#[test]
fn resolution_is_deterministic() {
    let rows = || {
        vec![
            tagged("L1", "O1", "A-1", "anchor"),
            tagged("L2", "O1", "B-1", "member"),
            tagged("L3", "O1", "B-2", "member"),
            line("L4", "O2", "X"),
        ]
    };
    let index = catalog();

    let first = resolve_orders(&index, rows());
    let second = resolve_orders(&index, rows());

    assert_eq!(first.orders, second.orders);
    assert_eq!(first.details, second.details);
    assert_eq!(first.stats, second.stats);
}
