use crate::batch::FlatItem;
use crate::normalize::{normalize_item, NormalizedRecord, Risk};
use serde::Serialize;
use std::collections::BTreeMap;

/// Counts over one snapshot of normalized records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub high_risk: usize,
    pub low_risk: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_label: BTreeMap<String, usize>,
}

pub fn summarize<'a>(records: impl IntoIterator<Item = &'a NormalizedRecord>) -> Summary {
    let mut s = Summary::default();
    for r in records {
        s.total += 1;
        match r.risk {
            Risk::High => s.high_risk += 1,
            Risk::Low => s.low_risk += 1,
            Risk::Unknown => {}
        }
        *s.by_type.entry(r.doc_type.as_str().to_string()).or_insert(0) += 1;
        *s.by_label.entry(r.label.clone()).or_insert(0) += 1;
    }
    s
}

pub fn summarize_items(items: &[FlatItem]) -> Summary {
    let records: Vec<NormalizedRecord> = items.iter().map(normalize_item).collect();
    summarize(&records)
}

/// Dashboard "high risk only" filter, applied before aggregation.
pub fn high_risk_only(items: &[FlatItem]) -> Vec<FlatItem> {
    items
        .iter()
        .filter(|item| normalize_item(item).risk == Risk::High)
        .cloned()
        .collect()
}
