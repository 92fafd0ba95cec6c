use medvault_client::analytics::{high_risk_only, summarize_items};
use medvault_client::batch::FlatItem;
use serde_json::{json, Value};

fn item(filename: &str, result: Value) -> FlatItem {
    FlatItem {
        filename: filename.to_string(),
        result,
    }
}

fn sample() -> Vec<FlatItem> {
    vec![
        item(
            "a.pdf",
            json!({"page_count": 1, "classification": {"label": "Radiology"}, "compliance": {"risk": "high"}}),
        ),
        item(
            "b.pdf",
            json!({"page_count": 2, "classification": {"label": "Lab Report"}, "compliance": {"risk": "low"}}),
        ),
        item(
            "c.xlsx",
            json!({"sheets": 1, "classification": {"label": "Radiology"}, "compliance": {"risk": "medium"}}),
        ),
        item("d.txt", json!({"error": "unsupported"})),
    ]
}

#[test]
fn counts_by_type_label_and_risk() {
    let s = summarize_items(&sample());
    assert_eq!(s.total, 4);
    assert_eq!(s.high_risk, 1);
    assert_eq!(s.low_risk, 1);
    assert_eq!(s.by_type.get("pdf"), Some(&2));
    assert_eq!(s.by_type.get("sheet"), Some(&1));
    assert_eq!(s.by_type.get("other"), Some(&1));
    assert_eq!(s.by_label.get("Radiology"), Some(&2));
    assert_eq!(s.by_label.get("unknown"), Some(&1));
    assert_eq!(s.by_type.values().sum::<usize>(), s.total);
}

#[test]
fn empty_input_is_all_zero() {
    let s = summarize_items(&[]);
    assert_eq!(s.total, 0);
    assert!(s.by_type.is_empty());
    assert!(s.by_label.is_empty());
}

#[test]
fn high_risk_filter_applies_before_counting() {
    let only = high_risk_only(&sample());
    assert_eq!(only.len(), 1);
    assert_eq!(only[0].filename, "a.pdf");
    let s = summarize_items(&only);
    assert_eq!(s.total, 1);
    assert_eq!(s.high_risk, 1);
    assert_eq!(s.low_risk, 0);
}
