use medvault_client::batch::FlatItem;
use medvault_client::table::{ResultsView, SortDir, SortKey};
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
            "b_scan.pdf",
            json!({
                "page_count": 1,
                "original_pages": ["Jane Doe"],
                "redacted_pages": ["[NAME]"],
                "classification": {"label": "Radiology", "confidence": 0.8},
                "compliance": {"risk": "high", "violations": ["NAME", "DOB", "SSN"]}
            }),
        ),
        item(
            "a_photo.png",
            json!({
                "pages": 1,
                "classification": {"label": "Lab Report", "confidence": 0.1},
                "compliance": {"risk": "low", "violations": []}
            }),
        ),
        item("c_notes.txt", json!({"error": "Unsupported file type"})),
    ]
}

fn names(view: &ResultsView<'_>) -> Vec<String> {
    view.rows().into_iter().map(|r| r.record.filename).collect()
}

#[test]
fn default_sort_is_filename_ascending() {
    let items = sample();
    let view = ResultsView::new(&items);
    assert_eq!(view.sort(), (SortKey::Filename, SortDir::Asc));
    assert_eq!(names(&view), vec!["a_photo.png", "b_scan.pdf", "c_notes.txt"]);
}

#[test]
fn same_key_flips_new_key_resets() {
    let items = sample();
    let mut view = ResultsView::new(&items);
    view.sort_by(SortKey::Filename);
    assert_eq!(view.sort(), (SortKey::Filename, SortDir::Desc));
    assert_eq!(names(&view), vec!["c_notes.txt", "b_scan.pdf", "a_photo.png"]);

    view.sort_by(SortKey::Violations);
    assert_eq!(view.sort(), (SortKey::Violations, SortDir::Asc));
    assert_eq!(names(&view), vec!["a_photo.png", "c_notes.txt", "b_scan.pdf"]);
}

#[test]
fn missing_confidence_sorts_below_any_value() {
    let items = sample();
    let mut view = ResultsView::new(&items);
    view.sort_by(SortKey::Confidence);
    assert_eq!(names(&view), vec!["c_notes.txt", "a_photo.png", "b_scan.pdf"]);
    view.sort_by(SortKey::Confidence);
    assert_eq!(names(&view), vec!["b_scan.pdf", "a_photo.png", "c_notes.txt"]);
}

#[test]
fn search_matches_name_type_label_and_risk() {
    let items = sample();
    let mut view = ResultsView::new(&items);

    view.set_query("RADIO");
    assert_eq!(names(&view), vec!["b_scan.pdf"]);

    view.set_query("image");
    assert_eq!(names(&view), vec!["a_photo.png"]);

    view.set_query("unknown");
    assert_eq!(names(&view), vec!["c_notes.txt"]);

    view.set_query("  ");
    assert_eq!(view.rows().len(), 3);

    view.set_query("nothing like this");
    assert!(view.rows().is_empty());
}

#[test]
fn search_folds_compatibility_forms() {
    let items = sample();
    let mut view = ResultsView::new(&items);
    view.set_query("ＬＡＢ");
    assert_eq!(names(&view), vec!["a_photo.png"]);
}

#[test]
fn expansion_follows_row_position() {
    let items = sample();
    let mut view = ResultsView::new(&items);
    view.toggle_expanded(1);
    assert!(view.is_expanded(1));

    let details = view.expanded_details();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].1, "b_scan.pdf");
    assert_eq!(details[0].2.original, "Jane Doe");
    assert_eq!(details[0].2.redacted, "[NAME]");

    view.sort_by(SortKey::Filename);
    let details = view.expanded_details();
    assert_eq!(details[0].1, "b_scan.pdf");

    view.set_query("photo");
    assert!(view.expanded_details().is_empty());

    view.toggle_expanded(1);
    assert!(!view.is_expanded(1));
}

#[test]
fn export_covers_visible_rows_in_order() {
    let items = sample();
    let mut view = ResultsView::new(&items);
    view.set_query("p");
    let rows = view.export_rows();
    let files: Vec<_> = rows.iter().filter_map(|r| r.get("filename")).collect();
    assert_eq!(files, vec!["a_photo.png", "b_scan.pdf"]);
    assert_eq!(rows[0].get("type"), Some("Image"));
    assert_eq!(rows[1].get("risk"), Some("high"));
    assert_eq!(rows[1].get("violations"), Some("3"));
    assert_eq!(rows[0].get("downloadUrl"), Some(""));
}

#[test]
fn sort_keys_parse_from_cli_names() {
    assert_eq!("classification".parse::<SortKey>(), Ok(SortKey::Label));
    assert_eq!(" Risk ".parse::<SortKey>(), Ok(SortKey::Risk));
    assert!("size".parse::<SortKey>().is_err());
}
