//! Builders shared by the resolver unit tests.

use ordsync_core::{BomEdge, CatalogSnapshot, PackagingUnit, RawOrderLine};
use rust_decimal::Decimal;

use crate::CatalogIndex;

pub(crate) fn line(line_id: &str, order_id: &str, component_code: &str) -> RawOrderLine {
    RawOrderLine {
        line_id: line_id.to_string(),
        order_id: order_id.to_string(),
        mall_product_id: "MP-1".to_string(),
        component_code: component_code.to_string(),
        set_member_tag: None,
        sale_count: 1,
        unit_pay_amount: Decimal::new(10_000, 0),
        delivery_cost: Decimal::new(3_000, 0),
        carrier: Some("CJ".to_string()),
        invoice_no: None,
        brand: Some("Daily Tea".to_string()),
        confirmed_at: None,
        group_label: None,
    }
}

pub(crate) fn tagged(line_id: &str, order_id: &str, component_code: &str, tag: &str) -> RawOrderLine {
    RawOrderLine {
        set_member_tag: Some(tag.to_string()),
        ..line(line_id, order_id, component_code)
    }
}

pub(crate) fn labelled(mut line: RawOrderLine, label: &str) -> RawOrderLine {
    line.group_label = Some(label.to_string());
    line
}

/// Products: 1 (A-1, A-2), 2 (B-1, B-2), 3 (C-1), 10 (X), 100 (SET-AB),
/// 101 (SET-AC). BOM: SET-AB = A-2 x1 + B-2 x2, SET-AC = A-1 x1 + C-1 x1.
pub(crate) fn catalog() -> CatalogIndex {
    let packagings = [
        ("A-1", 1),
        ("A-2", 1),
        ("B-1", 2),
        ("B-2", 2),
        ("C-1", 3),
        ("X", 10),
        ("SET-AB", 100),
        ("SET-AC", 101),
    ]
    .into_iter()
    .map(|(code, product_id)| PackagingUnit {
        packaging_id: code.to_string(),
        product_id,
    })
    .collect();

    let bom_edges = [
        ("SET-AB", "A-2", 1),
        ("SET-AB", "B-2", 2),
        ("SET-AC", "A-1", 1),
        ("SET-AC", "C-1", 1),
    ]
    .into_iter()
    .map(|(parent, child, quantity)| BomEdge {
        parent_packaging_id: parent.to_string(),
        child_packaging_id: child.to_string(),
        quantity,
    })
    .collect();

    CatalogIndex::build(CatalogSnapshot {
        packagings,
        bom_edges,
    })
    .expect("test catalog is valid")
}
