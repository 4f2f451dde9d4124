//! Plain-text report per target.

use mirrorcheck_core::{ComparisonRecord, Result, TargetResult};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Report file name: `<id>.txt`, or `<id>-<node>.txt` for CDN nodes
#[must_use]
pub fn report_file_name(result: &TargetResult) -> String {
    let stem = match &result.cdn_node_address {
        Some(node) => format!("{}-{node}", result.target_id),
        None => result.target_id.clone(),
    };
    let stem: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    format!("{stem}.txt")
}

/// Render the report body
#[must_use]
pub fn render_report(result: &TargetResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "name: {}", result.target_id);
    let _ = writeln!(out, "urlPrefix: {}", result.url_prefix);
    if let Some(node) = &result.cdn_node_address {
        let _ = writeln!(out, "cdn node address: {node}");
    }
    let _ = writeln!(out, "percent: {:.3}%", result.completion_percent);
    if result.is_complete() {
        out.push_str("sync completed\n");
    }
    if result.error_count > 0 {
        out.push_str("has error\n");
    }

    out.push_str("\n# Error:\n");
    for record in result.records.iter().filter(|r| r.is_error()) {
        let _ = writeln!(out, "file path: {}", record.standard.path);
        let _ = writeln!(out, "standard url: {}", record.standard.source_url);
        let _ = writeln!(out, "err: {}", record.failure.as_deref().unwrap_or_default());
        out.push('\n');
    }

    out.push_str("\n# Not Equal:\n");
    for (record, observed) in observed(result, false) {
        let standard = &record.standard;
        let _ = writeln!(out, "file path: {}", standard.path);
        let _ = writeln!(out, "standard url: {}", standard.source_url);
        let _ = writeln!(out, "url: {}", observed.source_url);
        let _ = writeln!(out, "standard size: {}", standard.byte_size);
        let _ = writeln!(out, "size: {}", observed.byte_size);
        let _ = writeln!(out, "standard digest: {}", standard.digest_hex());
        let _ = writeln!(out, "digest: {}", observed.digest_hex());
        let _ = writeln!(out, "standard mod time: {}", mod_time(standard.last_modified.as_deref()));
        let _ = writeln!(out, "mod time: {}", mod_time(observed.last_modified.as_deref()));
        out.push('\n');
    }

    out.push_str("\n# Equal:\n");
    for (record, observed) in observed(result, true) {
        let _ = writeln!(out, "file path: {}", record.standard.path);
        let _ = writeln!(out, "standard url: {}", record.standard.source_url);
        let _ = writeln!(out, "url: {}", observed.source_url);
        let _ = writeln!(out, "size: {}", observed.byte_size);
        let _ = writeln!(out, "digest: {}", observed.digest_hex());
        let _ = writeln!(
            out,
            "standard mod time: {}",
            mod_time(record.standard.last_modified.as_deref())
        );
        let _ = writeln!(out, "mod time: {}", mod_time(observed.last_modified.as_deref()));
        out.push('\n');
    }

    out
}

/// Write the report for `result` into `dir`
pub async fn write_report(dir: &Path, result: &TargetResult) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(report_file_name(result));
    tokio::fs::write(&path, render_report(result)).await?;
    Ok(path)
}

fn observed(
    result: &TargetResult,
    matches: bool,
) -> impl Iterator<Item = (&ComparisonRecord, &mirrorcheck_core::Fingerprint)> {
    result
        .records
        .iter()
        .filter(move |r| r.matches == matches)
        .filter_map(|r| r.observed.as_ref().map(|o| (r, o)))
}

fn mod_time(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}
