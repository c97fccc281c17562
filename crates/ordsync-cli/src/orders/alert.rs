//! Mapping-failure alert payload.
//!
//! Delivery to the alert channel happens outside this binary; the payload is
//! logged and printed so the caller can forward it.

use ordsync_db::{MappingAudit, UpsertSummary};
use ordsync_resolver::ResolutionStats;
use serde_json::{json, Value};

/// Build the alert payload for a finished upload run.
pub(super) fn build_alert_payload(
    run_id: i64,
    stats: &ResolutionStats,
    summary: &UpsertSummary,
    audit: &MappingAudit,
) -> Value {
    json!({
        "upload_run_id": run_id,
        "lines_received": stats.lines_received,
        "lines_dropped": stats.dropped_lines,
        "orders": stats.clusters,
        "bundles": stats.bundles,
        "inexact_bundles": stats.inexact_bundles,
        "records_written": summary.records_written(),
        "unmapped_singles": audit.unmapped_singles,
        "unmapped_bundles": audit.unmapped_bundles,
        "sample_codes": audit.sample_codes,
    })
}

/// True when the payload reports anything an operator should look at.
pub(super) fn needs_attention(stats: &ResolutionStats, audit: &MappingAudit) -> bool {
    audit.has_failures() || stats.dropped_lines > 0 || stats.inexact_bundles > 0
}

pub(super) fn emit_alert(payload: &Value, attention: bool) {
    if attention {
        tracing::warn!(alert = %payload, "order upload needs attention");
    } else {
        tracing::info!(alert = %payload, "order upload clean");
    }
    println!("{payload:#}");
}
