use chrono::Utc;
use revscrape_core::{MemoryStore, ProductRecord, ReviewDraft, ScrapeData};

use super::*;

const URL: &str = "https://www.example.com/p/N82E16819113877";

fn scraped(reviews: usize) -> ScrapeResult {
    let now = Utc::now();
    let mut product = ProductRecord::empty(URL, now);
    product.title = Some("AMD Ryzen 7 7800X3D".to_string());
    product.rating = Some(4.8);
    let reviews = (0..reviews)
        .filter_map(|i| {
            ReviewDraft {
                reviewer_name: Some(format!("buyer{i}")),
                body: Some(format!("Runs cool, review number {i}")),
                rating: Some(5.0),
                verified_purchase: i % 2 == 0,
                ..ReviewDraft::default()
            }
            .into_record(URL, now)
        })
        .collect();
    ScrapeResult::succeeded(
        ScrapeMethod::AntiBot,
        ScrapeData::new(product, reviews, ScrapeMethod::AntiBot, None),
    )
}

#[test]
fn persist_saves_truncated_result_and_records_session() {
    let mut store = MemoryStore::new();
    let mut result = scraped(5);
    result.truncate_reviews(3);
    let report = persist(&mut store, URL, result, Utc::now(), Duration::from_millis(1500)).unwrap();

    let ScrapeResponse::Completed(data) = &report.response else {
        panic!("expected completed response");
    };
    assert_eq!(data.reviews.len(), 3);
    assert_eq!(data.total_reviews_found, 3);
    assert_eq!(report.method, ScrapeMethod::AntiBot);
    assert_eq!(report.new_reviews, 3);

    let summary = store.summary();
    assert_eq!(summary.products, 1);
    assert_eq!(summary.reviews, 3);
    assert_eq!(summary.sessions, 1);
    assert_eq!(summary.successful_sessions, 1);
    assert_eq!(report.product_id, Some(store.product_by_url(URL).unwrap().id));
}

#[test]
fn rescraping_counts_only_new_reviews() {
    let mut store = MemoryStore::new();
    persist(&mut store, URL, scraped(2), Utc::now(), Duration::ZERO).unwrap();
    let report = persist(&mut store, URL, scraped(4), Utc::now(), Duration::ZERO).unwrap();

    assert_eq!(report.new_reviews, 2);
    assert_eq!(store.summary().reviews, 4);
    assert_eq!(store.summary().sessions, 2);
}

#[test]
fn failed_scrape_records_session_without_product() {
    let mut store = MemoryStore::new();
    let failed = ScrapeResult::failed(ScrapeMethod::AllFailed, "all strategies failed: 403");
    let report = persist(&mut store, URL, failed, Utc::now(), Duration::ZERO).unwrap();

    assert!(matches!(
        report.response,
        ScrapeResponse::Failed { ref error } if error.contains("403")
    ));
    assert!(report.product_id.is_none());
    let summary = store.summary();
    assert_eq!(summary.products, 0);
    assert_eq!(summary.sessions, 1);
    assert_eq!(summary.successful_sessions, 0);
}

#[test]
fn export_includes_stored_reviews() {
    let mut store = MemoryStore::new();
    persist(&mut store, URL, scraped(2), Utc::now(), Duration::ZERO).unwrap();

    let export = product_export(&store, URL).unwrap();
    assert_eq!(export.reviews.len(), 2);
    assert_eq!(export.product.title.as_deref(), Some("AMD Ryzen 7 7800X3D"));

    let json = serde_json::to_value(&export).unwrap();
    assert!(json["product_id"].is_string());
    assert_eq!(json["reviews"].as_array().map(Vec::len), Some(2));
}

#[test]
fn export_of_unknown_product_is_an_error() {
    let store = MemoryStore::new();
    let err = product_export(&store, URL).unwrap_err();
    assert!(err.to_string().contains("no stored product"));
}

#[test]
fn summary_renders_missing_average_as_na() {
    let rendered = render_summary(&MemoryStore::new().summary());
    assert!(rendered.contains("average rating:    n/a"));
    assert!(rendered.contains("sessions:          0 (0 successful)"));
}

#[test]
fn write_json_creates_parent_directories() {
    let dir = std::env::temp_dir().join(format!("revscrape-cli-{}", Uuid::new_v4()));
    let path = dir.join("nested").join("out.json");
    write_json(&path, &serde_json::json!({"ok": true})).unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["ok"], true);
    std::fs::remove_dir_all(dir).ok();
}
