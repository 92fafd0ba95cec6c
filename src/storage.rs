//! Key/value text storage scoped to one client.
//!
//! Each key is one file under the storage root. A storage with no root, or
//! whose root cannot be read or written, reports [`StorageUnavailable`];
//! callers downgrade that to empty/default state.

use crate::error::StorageUnavailable;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: Option<PathBuf>,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// A storage whose medium is missing. Every read is empty, every write fails.
    pub fn unavailable() -> Self {
        Self { root: None }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageUnavailable> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| StorageUnavailable("no storage directory".into()))?;
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        Ok(root.join(format!("{safe}.json")))
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StorageUnavailable> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageUnavailable(format!("{}: {e}", path.display()))),
        }
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StorageUnavailable> {
        let path = self.path_for(key)?;
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)
            .map_err(|e| StorageUnavailable(format!("{}: {e}", parent.display())))?;
        // Write a uniquely named sibling, then rename over the key file.
        let mut tmp = NamedTempFile::new_in(parent)
            .map_err(|e| StorageUnavailable(format!("{}: {e}", parent.display())))?;
        tmp.write_all(value.as_bytes())
            .map_err(|e| StorageUnavailable(format!("{}: {e}", tmp.path().display())))?;
        tmp.persist(&path)
            .map_err(|e| StorageUnavailable(format!("{}: {}", path.display(), e.error)))?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), StorageUnavailable> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageUnavailable(format!("{}: {e}", path.display()))),
        }
    }
}
