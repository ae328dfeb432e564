use chrono::Utc;

use super::*;
use crate::records::ReviewDraft;

const URL: &str = "https://www.example.com/p/N82E16819113877";

fn product(title: Option<&str>, price: Option<f64>) -> ProductRecord {
    let mut record = ProductRecord::empty(URL, Utc::now());
    record.title = title.map(str::to_string);
    record.price = price;
    record
}

fn review(name: &str, body: &str, rating: Option<f64>, verified: bool) -> ReviewRecord {
    ReviewDraft {
        reviewer_name: Some(name.to_string()),
        body: Some(body.to_string()),
        rating,
        verified_purchase: verified,
        ..ReviewDraft::default()
    }
    .into_record(URL, Utc::now())
    .expect("review with body is valid")
}

fn session(success: bool) -> ScrapeSession {
    ScrapeSession {
        url: URL.to_string(),
        method: ScrapeMethod::Fallback,
        success,
        error: (!success).then(|| "boom".to_string()),
        reviews_extracted: 0,
        new_reviews_saved: 0,
        duration_secs: 1.25,
        started_at: Utc::now(),
    }
}

fn temp_store_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("revscrape-store-{}", Uuid::new_v4()))
        .join("scrapes.json")
}

#[test]
fn products_are_deduplicated_by_url() {
    let mut store = MemoryStore::new();
    let first = store.save_product(&product(Some("CPU"), Some(449.0))).unwrap();
    let second = store.save_product(&product(None, Some(429.0))).unwrap();
    assert_eq!(first, second);

    let stored = store.product_by_url(URL).unwrap();
    assert_eq!(stored.record.title.as_deref(), Some("CPU"), "missing field keeps old value");
    assert_eq!(stored.record.price, Some(429.0), "present field is refreshed");
    assert_eq!(store.summary().products, 1);
}

#[test]
fn duplicate_reviews_are_skipped_not_updated() {
    let mut store = MemoryStore::new();
    let id = store.save_product(&product(Some("CPU"), None)).unwrap();

    let batch = vec![
        review("Jane", "Great", Some(5.0), true),
        review("John", "Runs hot", Some(3.0), false),
    ];
    assert_eq!(store.save_reviews(id, &batch).unwrap(), 2);

    let mut again = batch.clone();
    again.push(review("Ann", "Fast", Some(4.0), false));
    assert_eq!(store.save_reviews(id, &again).unwrap(), 1);
    assert_eq!(store.reviews_for_product(id).len(), 3);
}

#[test]
fn saving_reviews_for_unknown_product_fails() {
    let mut store = MemoryStore::new();
    let err = store
        .save_reviews(Uuid::new_v4(), &[review("Jane", "Great", None, false)])
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownProduct(_)));
}

#[test]
fn summary_aggregates_reviews_and_sessions() {
    let mut store = MemoryStore::new();
    let id = store.save_product(&product(Some("CPU"), None)).unwrap();
    store
        .save_reviews(
            id,
            &[
                review("Jane", "Great", Some(5.0), true),
                review("John", "Okay", Some(3.0), false),
                review("Ann", "No stars given", None, true),
            ],
        )
        .unwrap();
    store.record_session(session(true)).unwrap();
    store.record_session(session(false)).unwrap();

    let summary = store.summary();
    assert_eq!(summary.reviews, 3);
    assert_eq!(summary.verified_reviews, 2);
    assert_eq!(summary.sessions, 2);
    assert_eq!(summary.successful_sessions, 1);
    assert_eq!(summary.average_rating, Some(4.0));
}

#[test]
fn json_store_persists_across_reopen() {
    let path = temp_store_path();
    {
        let mut store = JsonFileStore::open(&path).unwrap();
        let id = store.save_product(&product(Some("CPU"), Some(449.0))).unwrap();
        store
            .save_reviews(id, &[review("Jane", "Great", Some(5.0), true)])
            .unwrap();
        store.record_session(session(true)).unwrap();
    }

    let reopened = JsonFileStore::open(&path).unwrap();
    let stored = reopened.product_by_url(URL).unwrap();
    assert_eq!(stored.record.price, Some(449.0));
    assert_eq!(reopened.reviews_for_product(stored.id).len(), 1);
    assert_eq!(reopened.summary().sessions, 1);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn json_store_rejects_corrupt_snapshot() {
    let path = temp_store_path();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{not json").unwrap();

    let err = JsonFileStore::open(&path).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
