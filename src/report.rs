use crate::{
    analytics::Summary,
    reconcile::BeforeAfter,
    store::StoredBatch,
    table::{ResultsView, SortDir},
    util::millis_to_rfc3339,
};
use std::fmt::Write;

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

pub fn render_history(batches: &[StoredBatch]) -> String {
    let mut out = String::new();
    if batches.is_empty() {
        out.push_str("No batches stored.\n");
        return out;
    }
    let _ = writeln!(out, "  {:<38} {:<26} {:>7}", "BATCH", "COMPLETED", "FILES");
    let _ = writeln!(out, "  {}", "-".repeat(73));
    for b in batches {
        let _ = writeln!(
            out,
            "  {:<38} {:<26} {:>7}",
            truncate(&b.id, 38),
            millis_to_rfc3339(b.timestamp),
            b.results.len()
        );
    }
    out
}

pub fn render_table(view: &ResultsView<'_>) -> String {
    let mut out = String::new();
    let rows = view.rows();
    let (key, dir) = view.sort();
    let arrow = match dir {
        SortDir::Asc => "▲",
        SortDir::Desc => "▼",
    };
    let _ = writeln!(out, "Processed Files (sorted by {key:?} {arrow})");
    if rows.is_empty() {
        out.push_str("  no matching files\n");
        return out;
    }
    let _ = writeln!(
        out,
        "  {:>3} {:<32} {:<9} {:<20} {:>10} {:<8} {:>4}  {}",
        "#", "FILE", "TYPE", "CLASSIFICATION", "CONFIDENCE", "RISK", "VIOL", "DOWNLOAD"
    );
    let _ = writeln!(out, "  {}", "-".repeat(100));
    for (i, row) in rows.iter().enumerate() {
        let r = &row.record;
        let marker = if view.is_expanded(i) { "v" } else { ">" };
        let confidence = r
            .confidence
            .map(|c| format!("{:.1}%", c * 100.0))
            .unwrap_or_else(|| "—".to_string());
        let _ = writeln!(
            out,
            "{} {:>3} {:<32} {:<9} {:<20} {:>10} {:<8} {:>4}  {}",
            marker,
            i,
            truncate(&r.filename, 32),
            r.doc_type.display_name(),
            truncate(&r.label, 20),
            confidence,
            r.risk.as_str(),
            r.violation_count,
            r.download_url.as_deref().unwrap_or("—")
        );
    }

    for (i, filename, content) in view.expanded_details() {
        let _ = writeln!(out);
        render_before_after(&mut out, i, &filename, &content);
    }
    out
}

fn render_before_after(out: &mut String, index: usize, filename: &str, content: &BeforeAfter) {
    let _ = writeln!(out, "[{index}] {filename}: Before & After Redaction Comparison");
    let _ = writeln!(out, "--- Original Content ---");
    let _ = writeln!(out, "{}", content.original);
    let _ = writeln!(out, "--- Redacted Content ---");
    let _ = writeln!(out, "{}", content.redacted);
}

pub fn render_summary(s: &Summary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "MedVault Dashboard");
    let _ = writeln!(out, "==================");
    let _ = writeln!(out);
    let _ = writeln!(out, "  Total files processed: {}", s.total);
    let _ = writeln!(out, "  Low risk:              {}", s.low_risk);
    let _ = writeln!(out, "  High risk:             {}", s.high_risk);

    if s.total == 0 {
        let _ = writeln!(out);
        let _ = writeln!(out, "  No data yet. Process documents to see breakdowns.");
        return out;
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "  By file type:");
    for (k, v) in &s.by_type {
        let _ = writeln!(out, "    {:<12} {:>6}", k.to_uppercase(), v);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "  By classification:");
    for (k, v) in &s.by_label {
        let _ = writeln!(out, "    {:<24} {:>6}", truncate(k, 24), v);
    }
    out
}
