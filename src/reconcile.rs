use crate::normalize::present;
use serde::Serialize;
use serde_json::Value;

pub const PAGE_BREAK: &str = "\n\n--- Page Break ---\n\n";
pub const NO_ORIGINAL: &str = "No original content available";
pub const NO_REDACTED: &str = "No redacted content available";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BeforeAfter {
    pub original: String,
    pub redacted: String,
}

/// Produces comparable before/after text for any payload shape. Never fails.
pub fn reconcile(result: &Value) -> BeforeAfter {
    if let (Some(o), Some(r)) = (present(result, "original"), present(result, "redacted")) {
        return BeforeAfter {
            original: stringify(o),
            redacted: stringify(r),
        };
    }

    if let (Some(o), Some(r)) = (
        present(result, "original_pages"),
        present(result, "redacted_pages"),
    ) {
        return BeforeAfter {
            original: join_pages(o),
            redacted: join_pages(r),
        };
    }

    if let Some(Value::Array(pages)) = result.get("results") {
        return BeforeAfter {
            original: numbered_pages(pages, "original"),
            redacted: numbered_pages(pages, "redacted"),
        };
    }

    BeforeAfter {
        original: present(result, "original")
            .map(stringify)
            .unwrap_or_else(|| NO_ORIGINAL.to_string()),
        redacted: present(result, "redacted")
            .map(stringify)
            .unwrap_or_else(|| NO_REDACTED.to_string()),
    }
}

/// Strings pass through; structured values are pretty-printed.
fn stringify(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

fn join_pages(v: &Value) -> String {
    match v {
        Value::Array(pages) => pages
            .iter()
            .map(stringify)
            .collect::<Vec<_>>()
            .join(PAGE_BREAK),
        other => stringify(other),
    }
}

fn numbered_pages(pages: &[Value], field: &str) -> String {
    pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            let text = present(page, field).map(stringify).unwrap_or_default();
            format!("Page {}:\n{}", i + 1, text)
        })
        .collect::<Vec<_>>()
        .join(PAGE_BREAK)
}
