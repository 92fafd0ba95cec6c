use anyhow::{Context, Result};
use std::path::Path;

/// A document staged for submission. Identity is its position in the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl PendingDocument {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading document: {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { filename, bytes })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Extensions the processing service knows how to route. Advisory only.
pub const ACCEPTED_EXTENSIONS: &[&str] = &[
    "pdf", "jpg", "jpeg", "png", "tiff", "dcm", "doc", "docx", "xlsx", "xls", "csv", "json", "hl7",
];

pub fn is_accepted(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| ACCEPTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Ordered, append-only selection of documents awaiting dispatch.
///
/// An empty set is "no selection": [`PendingSet::current`] returns `None`.
#[derive(Debug, Clone, Default)]
pub struct PendingSet {
    docs: Vec<PendingDocument>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the existing selection; never replaces it and never dedups.
    pub fn add(&mut self, files: impl IntoIterator<Item = PendingDocument>) {
        self.docs.extend(files);
    }

    /// Removes exactly one document, keeping the others in order.
    pub fn remove(&mut self, index: usize) -> Option<PendingDocument> {
        if index < self.docs.len() {
            Some(self.docs.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.docs.clear();
    }

    pub fn current(&self) -> Option<&[PendingDocument]> {
        if self.docs.is_empty() {
            None
        } else {
            Some(&self.docs)
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.docs.iter().map(PendingDocument::size).sum()
    }
}
