use crate::storage::LocalStorage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;
use tracing::{debug, info, warn};

pub const MAX_STORED_BATCHES: usize = 20;
const BATCHES_KEY: &str = "batches";

/// A completed batch as persisted: `{id, timestamp, results}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredBatch {
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub results: Vec<Value>,
}

/// Bounded, deduplicated, most-recent-first batch history.
///
/// None of the operations fail: an unavailable medium reads as empty and
/// writes are dropped with a warning. Records that do not decode are skipped
/// on read but kept on disk, so one bad record never costs the others.
pub struct BatchStore {
    storage: LocalStorage,
    write_lock: Mutex<()>,
}

impl BatchStore {
    pub fn new(storage: LocalStorage) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    pub fn load_all(&self) -> Vec<StoredBatch> {
        self.load_raw()
            .into_iter()
            .enumerate()
            .filter_map(|(i, entry)| match serde_json::from_value(entry) {
                Ok(batch) => Some(batch),
                Err(e) => {
                    warn!("skipping unreadable batch record #{i}: {e}");
                    None
                }
            })
            .collect()
    }

    /// The stored list, element by element. A history that is not a JSON
    /// array at all reads as empty.
    fn load_raw(&self) -> Vec<Value> {
        let raw = match self.storage.get(BATCHES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                debug!("batch history unreadable: {e}");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("batch history is corrupt, treating as empty: {e}");
                Vec::new()
            }
        }
    }

    /// Prepends `batch` unless its id is already stored. Returns whether it was written.
    pub fn save(&self, batch: StoredBatch) -> bool {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let existing = self.load_raw();
        if existing
            .iter()
            .any(|entry| entry.get("id").and_then(Value::as_str) == Some(batch.id.as_str()))
        {
            info!("skipping duplicate batch save: {}", batch.id);
            return false;
        }

        let id = batch.id.clone();
        let entry = match serde_json::to_value(&batch) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("could not serialize batch {id}: {e}");
                return false;
            }
        };
        let mut merged = Vec::with_capacity(existing.len() + 1);
        merged.push(entry);
        merged.extend(existing);
        merged.truncate(MAX_STORED_BATCHES);

        let raw = match serde_json::to_string(&merged) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("could not serialize batch history: {e}");
                return false;
            }
        };
        match self.storage.set(BATCHES_KEY, &raw) {
            Ok(()) => {
                debug!(batch_id = %id, stored = merged.len(), "batch saved");
                true
            }
            Err(e) => {
                warn!("batch {id} not persisted: {e}");
                false
            }
        }
    }

    pub fn clear(&self) {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = self.storage.remove(BATCHES_KEY) {
            warn!("could not clear batch history: {e}");
        }
    }
}
