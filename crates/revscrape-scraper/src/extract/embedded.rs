//! Reviews from application-state JSON embedded in page scripts.
//!
//! Regexes only locate where a JSON value starts; the value itself is read
//! with a streaming deserializer, so nested brackets and trailing script
//! text are handled without bracket-matching heuristics.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use revscrape_core::{ReviewDraft, ReviewRecord};
use serde_json::{Map, Value};

use super::jsonld::number;
use super::text::clean_opt;

const PLAUSIBLE_KEYS: [&str; 4] = ["Rating", "Comments", "NickName", "Title"];
const REVIEW_LIST_KEYS: [&str; 8] = [
    "ReviewList",
    "CustomerReviews",
    "Reviews",
    "reviewList",
    "reviews",
    "Review",
    "ProductReviews",
    "ItemReviews",
];
const NESTED_KEYS: [&str; 6] = [
    "ReviewInfo",
    "ProductDetail",
    "ItemDetail",
    "ReviewData",
    "data",
    "content",
];
const SCRIPT_MARKERS: [&str; 3] = ["Review", "rating", "Comments"];
const MIN_SCRIPT_LEN: usize = 1000;
const MAX_SCRIPTS: usize = 10;
const MAX_ARRAY_PROBES: usize = 200;
const MAX_DEPTH: usize = 8;

/// Each pattern's first group sits on the opening bracket of the value.
static STATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"window\.__initialState__\s*=\s*(\{)",
        r#""ReviewList"\s*:\s*(\[)"#,
        r#""CustomerReviews"\s*:\s*(\[)"#,
        r#""Reviews"\s*:\s*(\[)"#,
        r"reviewData\s*=\s*(\{)",
        r"\breviews\s*:\s*(\[)",
        r#"(\[)\s*\{\s*"(?:Rating|NickName|Comments)"\s*:"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>(.*?)</script>").expect("valid regex"));
static ARRAY_OF_OBJECTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\[)\s*\{").expect("valid regex"));

/// Scans raw markup for known state-blob shapes, then falls back to
/// review-shaped arrays inside large scripts. The first plausible list wins.
pub(crate) fn extract_embedded_reviews(
    html: &str,
    product_url: &str,
    scraped_at: DateTime<Utc>,
) -> Vec<ReviewRecord> {
    let list = STATE_PATTERNS
        .iter()
        .find_map(|re| first_review_list(html, re, usize::MAX))
        .or_else(|| scan_scripts(html));

    let Some(items) = list else {
        return Vec::new();
    };
    tracing::debug!(candidates = items.len(), "embedded review list found");

    items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| map_review(obj).into_record(product_url, scraped_at))
        .collect()
}

fn scan_scripts(html: &str) -> Option<Vec<Value>> {
    SCRIPT_RE
        .captures_iter(html)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
        .filter(|script| {
            script.len() > MIN_SCRIPT_LEN && SCRIPT_MARKERS.iter().any(|m| script.contains(m))
        })
        .take(MAX_SCRIPTS)
        .find_map(|script| first_review_list(script, &ARRAY_OF_OBJECTS_RE, MAX_ARRAY_PROBES))
}

fn first_review_list(text: &str, re: &Regex, max_probes: usize) -> Option<Vec<Value>> {
    re.captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .take(max_probes)
        .filter_map(|m| parse_value_at(text, m.start()))
        .find_map(|value| find_review_list(&value, 0))
}

/// Parses the single JSON value starting at byte `start`, ignoring whatever follows.
fn parse_value_at(text: &str, start: usize) -> Option<Value> {
    serde_json::Deserializer::from_str(text.get(start..)?)
        .into_iter::<Value>()
        .next()?
        .ok()
}

fn is_plausible(list: &[Value]) -> bool {
    list.first()
        .and_then(Value::as_object)
        .is_some_and(|first| PLAUSIBLE_KEYS.iter().any(|k| first.contains_key(*k)))
}

/// Depth-first search for an array of review-shaped objects.
fn find_review_list(value: &Value, depth: usize) -> Option<Vec<Value>> {
    if depth > MAX_DEPTH {
        return None;
    }
    match value {
        Value::Array(items) if is_plausible(items) => Some(items.clone()),
        Value::Array(items) => items.iter().find_map(|v| find_review_list(v, depth + 1)),
        Value::Object(obj) => REVIEW_LIST_KEYS
            .iter()
            .chain(NESTED_KEYS.iter())
            .filter_map(|k| obj.get(*k))
            .find_map(|v| find_review_list(v, depth + 1))
            .or_else(|| obj.values().find_map(|v| find_review_list(v, depth + 1))),
        _ => None,
    }
}

fn map_review(obj: &Map<String, Value>) -> ReviewDraft {
    let mut body = string_field(obj, &["Comments", "body", "text", "content", "review_text"]);
    let pros = string_field(obj, &["Pros"]);
    let cons = string_field(obj, &["Cons"]);
    if pros.is_some() || cons.is_some() {
        let suffix = format!(
            "Pros: {} | Cons: {}",
            pros.as_deref().unwrap_or(""),
            cons.as_deref().unwrap_or("")
        );
        body = Some(match body {
            Some(text) => format!("{text}\n\n{suffix}"),
            None => suffix,
        });
    }

    ReviewDraft {
        reviewer_name: string_field(obj, &["NickName", "DisplayName", "reviewer_name", "author"]),
        rating: ["Rating", "rating"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(number)),
        title: string_field(obj, &["Title", "title", "headline"]),
        body,
        date: string_field(obj, &["InDate", "date", "review_date", "created_at"]),
        verified_purchase: ["HasPurchased", "verified_purchase"]
            .iter()
            .any(|k| obj.get(*k).is_some_and(truthy)),
        helpful_count: ["TotalVoting", "TotalConsented", "helpful_count", "upvotes"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(count)),
    }
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) => clean_opt(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(inner) => inner.get("name").and_then(Value::as_str).and_then(clean_opt),
        _ => None,
    })
}

fn count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> Vec<ReviewRecord> {
        extract_embedded_reviews(html, "https://shop.test/p/1", Utc::now())
    }

    #[test]
    fn initial_state_with_nested_review_list() {
        let html = r#"<script>
            window.__initialState__ = {"ProductDetail":{"ReviewInfo":{"ReviewList":[
              {"NickName":"gpu_fan","Rating":5,"Title":"Fast","Comments":"Runs everything",
               "InDate":"2024-01-02","HasPurchased":true,"TotalVoting":7},
              {"NickName":"other","Rating":"2","Comments":"Coil whine; returned it"}
            ]}}};
            window.other = 1;
        </script>"#;
        let reviews = extract(html);
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].reviewer_name, "gpu_fan");
        assert_eq!(reviews[0].rating, Some(5.0));
        assert_eq!(reviews[0].title.as_deref(), Some("Fast"));
        assert!(reviews[0].verified_purchase);
        assert_eq!(reviews[0].helpful_count, Some(7));
        assert_eq!(reviews[1].rating, Some(2.0));
        assert!(!reviews[1].verified_purchase);
    }

    #[test]
    fn pros_and_cons_are_appended_to_body() {
        let html = r#"var s = {"CustomerReviews":[{"NickName":"a","Comments":"Good card",
            "Pros":"quiet","Cons":"pricey"}]};"#;
        let reviews = extract(html);
        assert_eq!(
            reviews[0].body.as_deref(),
            Some("Good card\n\nPros: quiet | Cons: pricey")
        );
    }

    #[test]
    fn pros_alone_become_the_body() {
        let html = r#"{"Reviews":[{"NickName":"b","Pros":"cheap"}]}"#;
        let reviews = extract(html);
        assert_eq!(reviews[0].body.as_deref(), Some("Pros: cheap | Cons:"));
    }

    #[test]
    fn implausible_arrays_are_ignored() {
        let html = r#"{"Reviews":[{"sku":"123"}]}"#;
        assert!(extract(html).is_empty());
    }

    #[test]
    fn large_script_scan_finds_review_array() {
        let padding = "x".repeat(1200);
        let html = format!(
            r#"<script>var pad = "{padding}"; var ids = [{{"id":1}}];
               var rv = [{{"Score":4,"Comments":"Solid build","NickName":"kit"}}];</script>"#
        );
        let reviews = extract(&html);
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].reviewer_name, "kit");
    }

    #[test]
    fn small_scripts_are_not_scanned() {
        let html = r#"<script>var rv = [{"Score":4,"Comments":"Solid"}];</script>"#;
        assert!(extract(html).is_empty());
    }

    #[test]
    fn entries_without_body_or_title_are_dropped() {
        let html = r#"{"ReviewList":[{"NickName":"x","Rating":3},{"NickName":"y","Comments":"ok"}]}"#;
        let reviews = extract(html);
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].reviewer_name, "y");
    }
}
