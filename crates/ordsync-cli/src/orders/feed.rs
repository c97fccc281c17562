//! Reading raw order lines from a feed file.
//!
//! A feed is either one JSON array of lines or newline-delimited JSON with
//! one line object per row. Blank rows in NDJSON are skipped.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use ordsync_core::RawOrderLine;

/// Read and parse the feed at `path`.
pub(crate) fn read_feed(path: &Path) -> anyhow::Result<Vec<RawOrderLine>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading feed file {}", path.display()))?;
    let lines = parse_feed(&content).with_context(|| format!("parsing {}", path.display()))?;
    tracing::info!(path = %path.display(), lines = lines.len(), "feed loaded");
    Ok(lines)
}

/// Parse feed text. Source line ids must be unique.
pub(crate) fn parse_feed(content: &str) -> anyhow::Result<Vec<RawOrderLine>> {
    let trimmed = content.trim_start();
    let lines: Vec<RawOrderLine> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).context("feed is not a valid JSON array of order lines")?
    } else {
        content
            .lines()
            .enumerate()
            .filter(|(_, row)| !row.trim().is_empty())
            .map(|(i, row)| {
                serde_json::from_str(row).with_context(|| format!("feed row {}", i + 1))
            })
            .collect::<anyhow::Result<_>>()?
    };

    let mut seen = HashSet::with_capacity(lines.len());
    if let Some(dup) = lines.iter().find(|&l| !seen.insert(l.line_id.as_str())) {
        anyhow::bail!("duplicate line_id '{}' in feed", dup.line_id);
    }

    Ok(lines)
}
