use crate::service::ProgressSnapshot;
use crate::store::StoredBatch;
use serde_json::Value;
use tracing::debug;

/// A dispatched batch as seen by the client while it is being processed.
///
/// `processed` and `results` only grow; once complete the batch is frozen.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub id: String,
    pub created_at: i64,
    pub total: u64,
    pub processed: u64,
    pub results: Vec<Value>,
}

impl Batch {
    pub fn new(id: impl Into<String>, total: u64, created_at: i64) -> Self {
        Self {
            id: id.into(),
            created_at,
            total,
            processed: 0,
            results: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.processed == self.total
    }

    /// Folds a progress snapshot in. Stale or shrinking snapshots and any
    /// snapshot after completion leave the batch unchanged.
    pub fn apply(&mut self, snap: &ProgressSnapshot) -> bool {
        if self.is_complete() {
            return false;
        }
        if snap.processed < self.processed || snap.results.len() < self.results.len() {
            debug!(
                batch_id = %self.id,
                processed = snap.processed,
                "ignoring stale progress snapshot"
            );
            return false;
        }
        let changed = snap.processed != self.processed
            || snap.total != self.total
            || snap.results.len() != self.results.len();
        self.processed = snap.processed;
        if snap.total > 0 {
            self.total = snap.total;
        }
        self.results = snap.results.clone();
        changed
    }

    pub fn to_stored(&self) -> StoredBatch {
        StoredBatch {
            id: self.id.clone(),
            timestamp: self.created_at,
            results: self.results.clone(),
        }
    }
}

/// One processed document pulled out of a stored batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatItem {
    pub filename: String,
    pub result: Value,
}

/// Splits a `{filename: payload}` entry. The first key wins; non-objects
/// and empty objects yield `None`.
pub fn split_entry(entry: &Value) -> Option<FlatItem> {
    let obj = entry.as_object()?;
    let (filename, result) = obj.iter().next()?;
    Some(FlatItem {
        filename: filename.clone(),
        result: result.clone(),
    })
}

/// Flattens batches (in the given order) into one list of items.
pub fn flatten(batches: &[StoredBatch]) -> Vec<FlatItem> {
    let mut out = Vec::new();
    for b in batches {
        for entry in &b.results {
            match split_entry(entry) {
                Some(item) => out.push(item),
                None => debug!(batch_id = %b.id, "skipping malformed result entry"),
            }
        }
    }
    out
}
