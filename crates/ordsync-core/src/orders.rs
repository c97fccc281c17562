use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a raw order line participates in a set/bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetTag {
    /// No tag: the line ships on its own.
    Standalone,
    /// Primary unit of a bundle; one anchor row per bundle unit sold.
    Anchor,
    /// Secondary component of a bundle.
    Member,
}

impl SetTag {
    pub const ANCHOR_MARKER: &'static str = "anchor";
    pub const MEMBER_MARKER: &'static str = "member";

    /// Interpret a marketplace set tag.
    ///
    /// Absent or blank tags are standalone. Any non-empty tag other than the
    /// anchor marker is a bundle member.
    #[must_use]
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => SetTag::Standalone,
            Some(tag) if tag.eq_ignore_ascii_case(Self::ANCHOR_MARKER) => SetTag::Anchor,
            Some(_) => SetTag::Member,
        }
    }

    /// Value persisted in the `set_tag` column; standalone rows store `NULL`.
    #[must_use]
    pub fn as_db_str(self) -> Option<&'static str> {
        match self {
            SetTag::Standalone => None,
            SetTag::Anchor => Some(Self::ANCHOR_MARKER),
            SetTag::Member => Some(Self::MEMBER_MARKER),
        }
    }

    /// Whether the row opens a commercial line of its own when grouping:
    /// untagged rows and anchor rows do, members never do.
    #[must_use]
    pub fn opens_line(self) -> bool {
        matches!(self, SetTag::Standalone | SetTag::Anchor)
    }

    #[must_use]
    pub fn is_bundle_part(self) -> bool {
        matches!(self, SetTag::Anchor | SetTag::Member)
    }
}

/// One shipped-item record as delivered by the Sabangnet order feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOrderLine {
    /// Sabangnet line id; unique and stable across re-fetches.
    pub line_id: String,
    pub order_id: String,
    pub mall_product_id: String,
    /// SKU as reported by the marketplace, matched against packaging ids.
    pub component_code: String,
    pub set_member_tag: Option<String>,
    pub sale_count: i32,
    #[serde(default)]
    pub unit_pay_amount: Decimal,
    #[serde(default)]
    pub delivery_cost: Decimal,
    pub carrier: Option<String>,
    pub invoice_no: Option<String>,
    pub brand: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Free-text option/product label, only used to split ambiguous groups.
    pub group_label: Option<String>,
}

impl RawOrderLine {
    #[must_use]
    pub fn tag(&self) -> SetTag {
        SetTag::from_raw(self.set_member_tag.as_deref())
    }

    /// Trimmed grouping label, or `None` when absent or blank.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.group_label
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// One commercial order line after grouping, composition and BOM matching.
///
/// Persisted as a master record keyed by `representative_line_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedOrderLine {
    pub representative_line_id: String,
    pub order_id: String,
    pub mall_product_id: String,
    /// `None` when the line could not be mapped to a catalog product.
    pub parent_product_id: Option<i64>,
    pub is_bundle: bool,
    /// Units sold: the row's count for singles, the anchor count for bundles.
    pub sale_count: i32,
    /// Normalized per-unit composition (`product_id -> count`); empty for singles.
    pub composition: BTreeMap<i64, i32>,
    /// `false` when a bundle component count did not divide evenly.
    pub normalization_exact: bool,
    pub unit_pay_amount: Decimal,
    pub delivery_cost: Decimal,
    pub carrier: Option<String>,
    pub invoice_no: Option<String>,
    pub brand: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// Per-raw-row detail record, keyed by the source `line_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetail {
    pub line_id: String,
    pub representative_line_id: String,
    pub order_id: String,
    pub component_code: String,
    /// Product resolved directly from `component_code`, if any.
    pub component_product_id: Option<i64>,
    pub set_tag: SetTag,
    pub sale_count: i32,
    pub unit_pay_amount: Decimal,
    pub group_label: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_json(tag: &str) -> String {
        format!(
            r#"{{
                "line_id": "L-1",
                "order_id": "O-1",
                "mall_product_id": "MP-1",
                "component_code": "8801000000011",
                "set_member_tag": {tag},
                "sale_count": 2,
                "unit_pay_amount": "12900",
                "group_label": "  Green Tea 2-pack  "
            }}"#
        )
    }

    #[test]
    fn from_raw_absent_and_blank_are_standalone() {
        assert_eq!(SetTag::from_raw(None), SetTag::Standalone);
        assert_eq!(SetTag::from_raw(Some("")), SetTag::Standalone);
        assert_eq!(SetTag::from_raw(Some("   ")), SetTag::Standalone);
    }

    #[test]
    fn from_raw_anchor_is_case_insensitive() {
        assert_eq!(SetTag::from_raw(Some("anchor")), SetTag::Anchor);
        assert_eq!(SetTag::from_raw(Some(" ANCHOR ")), SetTag::Anchor);
    }

    #[test]
    fn from_raw_other_values_are_members() {
        assert_eq!(SetTag::from_raw(Some("member")), SetTag::Member);
        assert_eq!(SetTag::from_raw(Some("sub")), SetTag::Member);
    }

    #[test]
    fn opens_line_excludes_members() {
        assert!(SetTag::Standalone.opens_line());
        assert!(SetTag::Anchor.opens_line());
        assert!(!SetTag::Member.opens_line());
    }

    #[test]
    fn as_db_str_maps_standalone_to_null() {
        assert_eq!(SetTag::Standalone.as_db_str(), None);
        assert_eq!(SetTag::Anchor.as_db_str(), Some("anchor"));
        assert_eq!(SetTag::Member.as_db_str(), Some("member"));
    }

    #[test]
    fn raw_order_line_deserializes_with_defaults() {
        let line: RawOrderLine = serde_json::from_str(&line_json("null")).unwrap();
        assert_eq!(line.line_id, "L-1");
        assert_eq!(line.tag(), SetTag::Standalone);
        assert_eq!(line.unit_pay_amount, Decimal::new(12900, 0));
        assert_eq!(line.delivery_cost, Decimal::ZERO);
        assert!(line.confirmed_at.is_none());
        assert!(line.carrier.is_none());
    }

    #[test]
    fn raw_order_line_tag_reads_anchor() {
        let line: RawOrderLine = serde_json::from_str(&line_json(r#""anchor""#)).unwrap();
        assert_eq!(line.tag(), SetTag::Anchor);
    }

    #[test]
    fn label_is_trimmed() {
        let line: RawOrderLine = serde_json::from_str(&line_json("null")).unwrap();
        assert_eq!(line.label(), Some("Green Tea 2-pack"));
    }

    #[test]
    fn blank_label_is_none() {
        let mut line: RawOrderLine = serde_json::from_str(&line_json("null")).unwrap();
        line.group_label = Some("  ".to_string());
        assert_eq!(line.label(), None);
    }
}
