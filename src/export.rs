//! CSV export.
//!
//! Rows are ordered key/value lists; the header is the union of keys over
//! all rows in first-seen order. Every field is quoted, quotes are doubled
//! and CR/LF become spaces so each record stays on one line.

use crate::batch::FlatItem;
use crate::normalize::{classify, NormalizedRecord};
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvRow {
    fields: Vec<(String, String)>,
}

impl CsvRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }
}

fn escape(v: &str) -> String {
    let flat = v.replace('"', "\"\"").replace(['\n', '\r'], " ");
    format!("\"{flat}\"")
}

pub fn to_csv(rows: &[CsvRow]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let mut headers: Vec<&str> = Vec::new();
    for row in rows {
        for k in row.keys() {
            if !headers.contains(&k) {
                headers.push(k);
            }
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.iter().map(|h| escape(h)).collect::<Vec<_>>().join(","));
    for row in rows {
        lines.push(
            headers
                .iter()
                .map(|h| escape(row.get(h).unwrap_or("")))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    lines.join("\n")
}

pub fn write_csv(path: &Path, rows: &[CsvRow]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        crate::util::ensure_dir(parent)?;
    }
    std::fs::write(path, to_csv(rows))
        .with_context(|| format!("writing CSV: {}", path.display()))?;
    info!("exported {} rows to {}", rows.len(), path.display());
    Ok(())
}

fn scalar_text(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Results-table projection of a normalized record.
pub fn record_row(r: &NormalizedRecord) -> CsvRow {
    CsvRow::new()
        .field("filename", r.filename.clone())
        .field("type", r.doc_type.display_name())
        .field("label", r.label.clone())
        .field(
            "confidence",
            r.confidence.map(|c| c.to_string()).unwrap_or_default(),
        )
        .field("risk", r.risk.as_str())
        .field("violations", r.violation_count.to_string())
        .field("downloadUrl", r.download_url.clone().unwrap_or_default())
}

/// Dashboard projection, read straight off the payload.
pub fn summary_row(item: &FlatItem) -> CsvRow {
    let result = &item.result;
    let compliance = result.get("compliance");
    let classification = result.get("classification");
    let violations = compliance
        .and_then(|c| c.get("violations"))
        .and_then(Value::as_array)
        .map(|vs| {
            vs.iter()
                .map(|v| scalar_text(Some(v)))
                .collect::<Vec<_>>()
                .join(";")
        })
        .unwrap_or_default();
    let page_count = result
        .get("page_count")
        .filter(|v| !v.is_null())
        .or_else(|| result.get("pages"));

    CsvRow::new()
        .field("filename", item.filename.clone())
        .field("type", classify(result).as_str())
        .field("risk", scalar_text(compliance.and_then(|c| c.get("risk"))))
        .field("violations", violations)
        .field(
            "label",
            scalar_text(classification.and_then(|c| c.get("label"))),
        )
        .field(
            "confidence",
            scalar_text(classification.and_then(|c| c.get("confidence"))),
        )
        .field("pageCount", scalar_text(page_count))
}

pub fn summary_rows(items: &[FlatItem]) -> Vec<CsvRow> {
    items.iter().map(summary_row).collect()
}

pub fn record_rows<'a>(records: impl IntoIterator<Item = &'a NormalizedRecord>) -> Vec<CsvRow> {
    records.into_iter().map(record_row).collect()
}
