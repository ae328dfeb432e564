//! Reviews from schema.org JSON-LD blocks.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use revscrape_core::{ReviewDraft, ReviewRecord};
use serde_json::Value;

use super::text::clean_opt;

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]+type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});

/// Extracts reviews from every `<script type="application/ld+json">` block.
///
/// `Product` objects contribute their `review` field (object or array);
/// `Review` objects are mapped directly. Blocks that fail to parse are skipped.
pub(crate) fn extract_jsonld_reviews(
    html: &str,
    product_url: &str,
    scraped_at: DateTime<Utc>,
) -> Vec<ReviewRecord> {
    let mut reviews = Vec::new();

    for cap in SCRIPT_RE.captures_iter(html) {
        let Some(json_text) = cap.get(1).map(|m| m.as_str()) else {
            continue;
        };
        let value: Value = match serde_json::from_str(json_text.trim()) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparseable JSON-LD block");
                continue;
            }
        };

        for item in candidates(value) {
            if has_type(&item, "Product") {
                if let Some(review) = item.get("review") {
                    reviews.extend(
                        as_items(review)
                            .filter_map(|r| map_review(r).into_record(product_url, scraped_at)),
                    );
                }
            } else if has_type(&item, "Review") {
                if let Some(record) = map_review(&item).into_record(product_url, scraped_at) {
                    reviews.push(record);
                }
            }
        }
    }

    reviews
}

/// Top-level object, array members, and `@graph` members.
fn candidates(value: Value) -> Vec<Value> {
    let mut items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };
    let graph: Vec<Value> = items
        .iter()
        .filter_map(|item| item.get("@graph").and_then(Value::as_array))
        .flatten()
        .cloned()
        .collect();
    items.extend(graph);
    items
}

fn as_items(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Array(items) => Box::new(items.iter()),
        other => Box::new(std::iter::once(other)),
    }
}

/// `@type` may be a string or an array of strings.
fn has_type(item: &Value, wanted: &str) -> bool {
    match item.get("@type") {
        Some(Value::String(t)) => t.eq_ignore_ascii_case(wanted),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| t.eq_ignore_ascii_case(wanted)),
        _ => false,
    }
}

fn map_review(review: &Value) -> ReviewDraft {
    ReviewDraft {
        reviewer_name: review.get("author").and_then(author_name),
        rating: review
            .get("reviewRating")
            .and_then(|r| r.get("ratingValue"))
            .and_then(number),
        title: first_string(review, &["headline", "name"]),
        body: first_string(review, &["reviewBody", "description", "text"]),
        date: first_string(review, &["datePublished"]),
        verified_purchase: false,
        helpful_count: None,
    }
}

fn author_name(author: &Value) -> Option<String> {
    match author {
        Value::String(name) => clean_opt(name),
        Value::Object(_) => author.get("name").and_then(Value::as_str).and_then(clean_opt),
        Value::Array(authors) => authors.iter().find_map(author_name),
        _ => None,
    }
}

/// Ratings arrive as numbers or numeric strings.
pub(crate) fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn first_string(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| item.get(*key).and_then(Value::as_str).and_then(clean_opt))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> Vec<ReviewRecord> {
        extract_jsonld_reviews(html, "https://shop.test/p/1", Utc::now())
    }

    #[test]
    fn single_review_object() {
        let html = r#"<script type="application/ld+json">
            {"@type":"Review","author":{"name":"Jane"},
             "reviewRating":{"ratingValue":"5"},"reviewBody":"Great"}
        </script>"#;
        let reviews = extract(html);
        assert_eq!(reviews.len(), 1);
        let review = &reviews[0];
        assert_eq!(review.reviewer_name, "Jane");
        assert_eq!(review.rating, Some(5.0));
        assert_eq!(review.body.as_deref(), Some("Great"));
        assert!(!review.verified_purchase);
        assert_eq!(review.product_url, "https://shop.test/p/1");
    }

    #[test]
    fn product_reviews_in_graph() {
        let html = r#"<script type='application/ld+json'>
            {"@context":"https://schema.org","@graph":[
              {"@type":"WebPage","name":"ignored"},
              {"@type":["Product","Thing"],"name":"Fan","review":[
                {"@type":"Review","author":"Sam","headline":"Quiet","reviewRating":{"ratingValue":4},
                 "datePublished":"2024-03-15"},
                {"@type":"Review","author":[{"name":"Lee"}],"description":"Loud at full speed"}
              ]}
            ]}
        </script>"#;
        let reviews = extract(html);
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].reviewer_name, "Sam");
        assert_eq!(reviews[0].title.as_deref(), Some("Quiet"));
        assert_eq!(reviews[0].rating, Some(4.0));
        assert_eq!(
            reviews[0].date.as_ref().and_then(|d| d.parsed).map(|d| d.to_string()),
            Some("2024-03-15".to_string())
        );
        assert_eq!(reviews[1].reviewer_name, "Lee");
        assert_eq!(reviews[1].body.as_deref(), Some("Loud at full speed"));
    }

    #[test]
    fn array_top_level_and_anonymous_default() {
        let html = r#"<script type="application/ld+json">
            [{"@type":"Review","reviewBody":"Works fine"}]
        </script>"#;
        let reviews = extract(html);
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].reviewer_name, "Anonymous");
        assert_eq!(reviews[0].rating, None);
    }

    #[test]
    fn drops_reviews_without_title_or_body() {
        let html = r#"<script type="application/ld+json">
            {"@type":"Review","author":"Ghost","reviewRating":{"ratingValue":"3"}}
        </script>"#;
        assert!(extract(html).is_empty());
    }

    #[test]
    fn malformed_blocks_are_skipped() {
        let html = r#"
            <script type="application/ld+json">{not json</script>
            <script type="application/ld+json">{"@type":"Review","name":"Solid","author":"Kim"}</script>
        "#;
        let reviews = extract(html);
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].title.as_deref(), Some("Solid"));
    }

    #[test]
    fn out_of_range_rating_is_dropped_not_clamped() {
        let html = r#"<script type="application/ld+json">
            {"@type":"Review","reviewBody":"Meh","reviewRating":{"ratingValue":"9"}}
        </script>"#;
        let reviews = extract(html);
        assert_eq!(reviews[0].rating, None);
    }
}
