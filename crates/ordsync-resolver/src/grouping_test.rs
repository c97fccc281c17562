use super::*;
use crate::test_support::{labelled, line, tagged};

fn ids(cluster: &Cluster) -> Vec<&str> {
    cluster.lines().iter().map(|l| l.line_id.as_str()).collect()
}

#[test]
fn single_untagged_line_is_its_own_cluster() {
    let outcome = group_lines(vec![line("L1", "O1", "X")]);

    assert_eq!(outcome.clusters.len(), 1);
    assert!(outcome.dropped.is_empty());
    assert_eq!(outcome.clusters[0].order_id(), "O1");
    assert_eq!(outcome.clusters[0].mall_product_id(), "MP-1");
    assert_eq!(outcome.clusters[0].label(), None);
}

#[test]
fn groups_by_order_and_mall_product() {
    let mut other_product = line("L3", "O1", "X");
    other_product.mall_product_id = "MP-2".to_string();

    let outcome = group_lines(vec![
        line("L1", "O1", "X"),
        line("L2", "O2", "X"),
        other_product,
    ]);

    assert_eq!(outcome.clusters.len(), 3);
    let keys: Vec<(&str, &str)> = outcome
        .clusters
        .iter()
        .map(|c| (c.order_id(), c.mall_product_id()))
        .collect();
    assert_eq!(keys, [("O1", "MP-1"), ("O2", "MP-1"), ("O1", "MP-2")]);
}

#[test]
fn single_anchor_with_members_stays_together_without_labels() {
    let outcome = group_lines(vec![
        tagged("L1", "O1", "A-1", "anchor"),
        tagged("L2", "O1", "B-1", "member"),
        tagged("L3", "O1", "B-1", "member"),
    ]);

    assert_eq!(outcome.clusters.len(), 1);
    assert!(outcome.dropped.is_empty());
    assert_eq!(ids(&outcome.clusters[0]), ["L1", "L2", "L3"]);
}

#[test]
fn members_only_group_is_not_split() {
    let outcome = group_lines(vec![
        tagged("L1", "O1", "B-1", "member"),
        tagged("L2", "O1", "B-1", "member"),
    ]);

    assert_eq!(outcome.clusters.len(), 1);
    assert_eq!(outcome.clusters[0].lines().len(), 2);
}

#[test]
fn multiple_openers_are_split_by_label() {
    let outcome = group_lines(vec![
        labelled(line("L1", "O1", "X"), "Green Tea"),
        labelled(tagged("L2", "O1", "A-2", "anchor"), "Gift Set"),
        labelled(tagged("L3", "O1", "B-2", "member"), "Gift Set"),
        labelled(tagged("L4", "O1", "B-2", "member"), "Gift Set"),
    ]);

    assert!(outcome.dropped.is_empty());
    assert_eq!(outcome.clusters.len(), 2);
    assert_eq!(outcome.clusters[0].label(), Some("Green Tea"));
    assert_eq!(ids(&outcome.clusters[0]), ["L1"]);
    assert_eq!(outcome.clusters[1].label(), Some("Gift Set"));
    assert_eq!(ids(&outcome.clusters[1]), ["L2", "L3", "L4"]);
}

#[test]
fn bundle_sold_twice_keeps_both_anchors_in_one_cluster() {
    let outcome = group_lines(vec![
        labelled(tagged("L1", "O1", "A-2", "anchor"), "Gift Set"),
        labelled(tagged("L2", "O1", "A-2", "anchor"), "Gift Set"),
        labelled(tagged("L3", "O1", "B-2", "member"), "Gift Set"),
        labelled(tagged("L4", "O1", "B-2", "member"), "Gift Set"),
    ]);

    assert_eq!(outcome.clusters.len(), 1);
    assert_eq!(outcome.clusters[0].lines().len(), 4);
}

#[test]
fn unlabelled_lines_in_ambiguous_group_are_dropped() {
    let outcome = group_lines(vec![
        labelled(line("L1", "O1", "X"), "Green Tea"),
        line("L2", "O1", "X"),
        labelled(line("L3", "O1", "X"), "  "),
    ]);

    assert_eq!(outcome.clusters.len(), 1);
    assert_eq!(ids(&outcome.clusters[0]), ["L1"]);
    let dropped: Vec<&str> = outcome.dropped.iter().map(|l| l.line_id.as_str()).collect();
    assert_eq!(dropped, ["L2", "L3"]);
}

#[test]
fn labels_are_ignored_for_unambiguous_groups() {
    let outcome = group_lines(vec![
        labelled(tagged("L1", "O1", "A-1", "anchor"), "Set"),
        tagged("L2", "O1", "C-1", "member"),
    ]);

    assert!(outcome.dropped.is_empty());
    assert_eq!(outcome.clusters.len(), 1);
    assert_eq!(outcome.clusters[0].label(), None);
}

#[test]
fn cluster_lines_are_sorted_by_line_id() {
    let outcome = group_lines(vec![
        tagged("L3", "O1", "B-1", "member"),
        tagged("L1", "O1", "A-1", "anchor"),
        tagged("L2", "O1", "B-1", "member"),
    ]);

    assert_eq!(ids(&outcome.clusters[0]), ["L1", "L2", "L3"]);
}

#[test]
fn numeric_line_ids_sort_by_value() {
    let outcome = group_lines(vec![
        tagged("10", "O1", "B-1", "member"),
        tagged("9", "O1", "A-1", "anchor"),
        tagged("100", "O1", "B-1", "member"),
    ]);

    assert_eq!(ids(&outcome.clusters[0]), ["9", "10", "100"]);
}

#[test]
fn line_id_order_is_total_across_numeric_and_text_ids() {
    use std::cmp::Ordering;

    assert_eq!(cmp_line_ids("9", "10"), Ordering::Less);
    assert_eq!(cmp_line_ids("10", "1a"), Ordering::Less);
    assert_eq!(cmp_line_ids("1a", "9"), Ordering::Greater);
    assert_eq!(cmp_line_ids("010", "10"), Ordering::Less);
    assert_eq!(cmp_line_ids("L2", "L10"), Ordering::Greater);

    let mut mixed = vec!["1a", "10", "L1", "9", "010"];
    mixed.sort_by(|a, b| cmp_line_ids(a, b));
    assert_eq!(mixed, ["9", "010", "10", "1a", "L1"]);
}

#[test]
fn every_labelled_line_lands_in_exactly_one_cluster() {
    let input = vec![
        labelled(line("L1", "O1", "X"), "a"),
        labelled(line("L2", "O1", "X"), "b"),
        labelled(tagged("L3", "O1", "A-1", "anchor"), "c"),
        labelled(tagged("L4", "O1", "C-1", "member"), "c"),
        line("L5", "O1", "X"),
        labelled(line("L6", "O2", "X"), "a"),
        labelled(line("L7", "O2", "X"), "a"),
    ];
    let labelled_ids: Vec<String> = input
        .iter()
        .filter(|l| l.label().is_some())
        .map(|l| l.line_id.clone())
        .collect();
    let total = input.len();

    let outcome = group_lines(input);

    let mut seen: Vec<&str> = outcome
        .clusters
        .iter()
        .flat_map(|c| c.lines().iter().map(|l| l.line_id.as_str()))
        .collect();
    seen.sort_unstable();
    let mut expected: Vec<&str> = labelled_ids.iter().map(String::as_str).collect();
    expected.sort_unstable();

    assert_eq!(seen, expected);
    assert_eq!(outcome.dropped.len(), 1);
    assert_eq!(outcome.dropped[0].line_id, "L5");
    assert_eq!(seen.len() + outcome.dropped.len(), total);
    assert!(outcome.clusters.iter().all(|c| !c.lines().is_empty()));
}

#[test]
fn empty_input_yields_nothing() {
    let outcome = group_lines(Vec::new());
    assert!(outcome.clusters.is_empty());
    assert!(outcome.dropped.is_empty());
}
