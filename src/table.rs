use crate::batch::FlatItem;
use crate::export::{record_rows, CsvRow};
use crate::normalize::{normalize_item, NormalizedRecord};
use crate::reconcile::{reconcile, BeforeAfter};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Filename,
    Type,
    Label,
    Confidence,
    Risk,
    Violations,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "filename" | "file" => Ok(SortKey::Filename),
            "type" => Ok(SortKey::Type),
            "label" | "classification" => Ok(SortKey::Label),
            "confidence" => Ok(SortKey::Confidence),
            "risk" => Ok(SortKey::Risk),
            "violations" => Ok(SortKey::Violations),
            other => Err(format!("unknown sort key: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    fn flip(self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }
}

/// A visible row: the normalized record plus the item it came from.
#[derive(Debug, Clone)]
pub struct ViewRow<'a> {
    pub record: NormalizedRecord,
    pub item: &'a FlatItem,
}

/// Search/sort/expand state over a fixed set of items.
///
/// Expansion is keyed by row position in the current view, so changing the
/// sort or the query can move an expansion onto a different document.
#[derive(Debug, Clone)]
pub struct ResultsView<'a> {
    items: &'a [FlatItem],
    query: String,
    sort_key: SortKey,
    sort_dir: SortDir,
    expanded: BTreeSet<usize>,
}

impl<'a> ResultsView<'a> {
    pub fn new(items: &'a [FlatItem]) -> Self {
        Self {
            items,
            query: String::new(),
            sort_key: SortKey::default(),
            sort_dir: SortDir::default(),
            expanded: BTreeSet::new(),
        }
    }

    pub fn set_query(&mut self, q: impl Into<String>) {
        self.query = q.into();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Same key flips direction; a new key starts ascending.
    pub fn sort_by(&mut self, key: SortKey) {
        if self.sort_key == key {
            self.sort_dir = self.sort_dir.flip();
        } else {
            self.sort_key = key;
            self.sort_dir = SortDir::Asc;
        }
    }

    pub fn sort(&self) -> (SortKey, SortDir) {
        (self.sort_key, self.sort_dir)
    }

    pub fn toggle_expanded(&mut self, index: usize) {
        if !self.expanded.remove(&index) {
            self.expanded.insert(index);
        }
    }

    pub fn is_expanded(&self, index: usize) -> bool {
        self.expanded.contains(&index)
    }

    pub fn rows(&self) -> Vec<ViewRow<'a>> {
        let q = fold(self.query.trim());
        let mut rows: Vec<ViewRow<'a>> = self
            .items
            .iter()
            .map(|item| ViewRow {
                record: normalize_item(item),
                item,
            })
            .filter(|row| q.is_empty() || matches_query(&row.record, &q))
            .collect();

        let key = self.sort_key;
        let dir = self.sort_dir;
        rows.sort_by(|a, b| {
            let ord = compare(&a.record, &b.record, key);
            match dir {
                SortDir::Asc => ord,
                SortDir::Desc => ord.reverse(),
            }
        });
        rows
    }

    /// Before/after text for every expanded row still in range.
    pub fn expanded_details(&self) -> Vec<(usize, String, BeforeAfter)> {
        let rows = self.rows();
        self.expanded
            .iter()
            .filter_map(|&i| {
                rows.get(i)
                    .map(|row| (i, row.record.filename.clone(), reconcile(&row.item.result)))
            })
            .collect()
    }

    /// CSV rows for exactly what is visible, in view order.
    pub fn export_rows(&self) -> Vec<CsvRow> {
        let rows = self.rows();
        record_rows(rows.iter().map(|r| &r.record))
    }
}

fn fold(s: &str) -> String {
    s.nfkc().collect::<String>().to_lowercase()
}

fn matches_query(r: &NormalizedRecord, folded_query: &str) -> bool {
    let hay = format!(
        "{} {} {} {}",
        r.filename,
        r.doc_type.display_name(),
        r.label,
        r.risk.as_str()
    );
    fold(&hay).contains(folded_query)
}

fn compare(a: &NormalizedRecord, b: &NormalizedRecord, key: SortKey) -> Ordering {
    match key {
        SortKey::Confidence => {
            let va = a.confidence.unwrap_or(-1.0);
            let vb = b.confidence.unwrap_or(-1.0);
            va.partial_cmp(&vb).unwrap_or(Ordering::Equal)
        }
        SortKey::Violations => a.violation_count.cmp(&b.violation_count),
        SortKey::Filename => a.filename.cmp(&b.filename),
        SortKey::Type => a.doc_type.display_name().cmp(b.doc_type.display_name()),
        SortKey::Label => a.label.cmp(&b.label),
        SortKey::Risk => a.risk.as_str().cmp(b.risk.as_str()),
    }
}
