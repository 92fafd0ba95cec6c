//! Result payload classification and summary extraction.
//!
//! Payload shapes differ per processing path. [`classify`] checks the shape
//! predicates in a fixed order and the first match wins, so every payload
//! lands in exactly one [`DocumentType`].

use crate::batch::FlatItem;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Pdf,
    Image,
    Word,
    Sheet,
    Dicom,
    StructuredMessage,
    Other,
}

impl DocumentType {
    /// Key used in analytics and CSV output.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Image => "image",
            DocumentType::Word => "word",
            DocumentType::Sheet => "sheet",
            DocumentType::Dicom => "dicom",
            DocumentType::StructuredMessage => "json/hl7",
            DocumentType::Other => "other",
        }
    }

    /// Column text in the results table.
    pub fn display_name(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "PDF",
            DocumentType::Image => "Image",
            DocumentType::Word => "Word",
            DocumentType::Sheet => "Sheet",
            DocumentType::Dicom => "DICOM",
            DocumentType::StructuredMessage => "JSON/HL7",
            DocumentType::Other => "Other",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// JSON truthiness: absent, null, false, 0 and "" do not count as present.
pub(crate) fn present<'a>(v: &'a Value, key: &str) -> Option<&'a Value> {
    let field = v.get(key)?;
    let truthy = match field {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    };
    truthy.then_some(field)
}

pub fn classify(result: &Value) -> DocumentType {
    if present(result, "page_count").is_some() {
        DocumentType::Pdf
    } else if present(result, "pages").is_some() {
        DocumentType::Image
    } else if present(result, "results").is_some_and(Value::is_array)
        && present(result, "filename").is_some()
    {
        DocumentType::Word
    } else if present(result, "sheets").is_some() {
        DocumentType::Sheet
    } else if present(result, "metadata").is_some() {
        DocumentType::Dicom
    } else if present(result, "original").is_some() && present(result, "redacted").is_some() {
        DocumentType::StructuredMessage
    } else {
        DocumentType::Other
    }
}

pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    High,
    Low,
    Unknown,
}

impl Risk {
    pub fn as_str(&self) -> &'static str {
        match self {
            Risk::High => "high",
            Risk::Low => "low",
            Risk::Unknown => UNKNOWN,
        }
    }

    fn from_payload(v: Option<&Value>) -> Self {
        match v.and_then(Value::as_str) {
            Some("high") => Risk::High,
            Some("low") => Risk::Low,
            _ => Risk::Unknown,
        }
    }
}

/// The canonical per-document summary. Derived on every view, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub filename: String,
    pub doc_type: DocumentType,
    pub label: String,
    pub confidence: Option<f64>,
    pub risk: Risk,
    pub violation_count: usize,
    pub download_url: Option<String>,
}

pub fn normalize(filename: &str, result: &Value) -> NormalizedRecord {
    let classification = result.get("classification");
    let compliance = result.get("compliance");

    let label = classification
        .and_then(|c| c.get("label"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string();
    let confidence = classification
        .and_then(|c| c.get("confidence"))
        .and_then(Value::as_f64);
    let risk = Risk::from_payload(compliance.and_then(|c| c.get("risk")));
    let violation_count = compliance
        .and_then(|c| c.get("violations"))
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);

    NormalizedRecord {
        filename: filename.to_string(),
        doc_type: classify(result),
        label,
        confidence,
        risk,
        violation_count,
        download_url: download_reference(result),
    }
}

pub fn normalize_item(item: &FlatItem) -> NormalizedRecord {
    normalize(&item.filename, &item.result)
}

/// `download_url`, else `download.url`.
pub fn download_reference(result: &Value) -> Option<String> {
    let direct = result.get("download_url").and_then(Value::as_str);
    let nested = result
        .get("download")
        .and_then(|d| d.get("url"))
        .and_then(Value::as_str);
    direct
        .filter(|s| !s.is_empty())
        .or(nested.filter(|s| !s.is_empty()))
        .map(String::from)
}
