//! Product and review value types produced by the extraction engine.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Sentinel reviewer name used when none can be recovered.
pub const ANONYMOUS_REVIEWER: &str = "Anonymous";

/// Number of hex characters kept from the review content hash.
const REVIEW_ID_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub title: Option<String>,
    pub brand: Option<String>,
    pub price: Option<f64>,
    /// Always within `[0.0, 5.0]` when present.
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub description: Option<String>,
    pub url: String,
    pub scraped_at: DateTime<Utc>,
}

impl ProductRecord {
    /// An empty record for `url`; every optional field starts absent.
    #[must_use]
    pub fn empty(url: &str, scraped_at: DateTime<Utc>) -> Self {
        Self {
            title: None,
            brand: None,
            price: None,
            rating: None,
            review_count: None,
            description: None,
            url: url.to_string(),
            scraped_at,
        }
    }
}

/// A review date as found on the page, with a best-effort calendar parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDate {
    pub raw: String,
    pub parsed: Option<NaiveDate>,
}

const DATE_FORMATS: [&str; 8] = [
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

impl ReviewDate {
    /// Parses common review date spellings. Unrecognised text is kept raw.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim().to_string();
        let parsed = parse_calendar_date(&raw);
        Self { raw, parsed }
    }

    /// `YYYY-MM-DD` when parsed, otherwise the raw text.
    #[must_use]
    pub fn normalized(&self) -> String {
        self.parsed
            .map_or_else(|| self.raw.clone(), |d| d.format("%Y-%m-%d").to_string())
    }
}

fn parse_calendar_date(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }

    // ISO datetimes such as "2022-10-28T11:59:08.95" carry the date up front.
    if let Some(prefix) = text.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }

    // Labels like "Posted 12/25/2023" wrap a numeric date in other words.
    text.split_whitespace().find_map(|token| {
        let token = token.trim_matches(|c: char| !c.is_ascii_alphanumeric());
        ["%m/%d/%Y", "%m-%d-%Y", "%Y-%m-%d"]
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(token, format).ok())
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub review_id: String,
    pub reviewer_name: String,
    pub rating: Option<f64>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub date: Option<ReviewDate>,
    pub verified_purchase: bool,
    pub helpful_count: Option<u32>,
    pub product_url: String,
    pub scraped_at: DateTime<Utc>,
}

/// Review fields as recovered by one extraction tier, before validation.
///
/// Every tier builds drafts and converts them with [`ReviewDraft::into_record`],
/// which is the single place the record invariants are enforced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewDraft {
    pub reviewer_name: Option<String>,
    pub rating: Option<f64>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub date: Option<String>,
    pub verified_purchase: bool,
    pub helpful_count: Option<u32>,
}

impl ReviewDraft {
    /// Validates the draft and derives its dedupe identifier.
    ///
    /// Returns `None` when the draft has neither a title nor a body. Blank
    /// strings count as absent and out-of-range ratings are dropped.
    #[must_use]
    pub fn into_record(self, product_url: &str, scraped_at: DateTime<Utc>) -> Option<ReviewRecord> {
        let title = non_blank(self.title);
        let body = non_blank(self.body);
        if title.is_none() && body.is_none() {
            return None;
        }

        let reviewer_name =
            non_blank(self.reviewer_name).unwrap_or_else(|| ANONYMOUS_REVIEWER.to_string());
        let date = non_blank(self.date).map(|d| ReviewDate::parse(&d));
        let date_key = date.as_ref().map(ReviewDate::normalized).unwrap_or_default();
        let review_id = review_id(&reviewer_name, body.as_deref().unwrap_or(""), &date_key);

        Some(ReviewRecord {
            review_id,
            reviewer_name,
            rating: self.rating.filter(|r| (0.0..=5.0).contains(r)),
            title,
            body,
            date,
            verified_purchase: self.verified_purchase,
            helpful_count: self.helpful_count,
            product_url: product_url.to_string(),
            scraped_at,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Content hash over reviewer, body and date, truncated to 16 hex chars.
///
/// Fields are NUL-separated so `("ab", "c")` and `("a", "bc")` differ.
#[must_use]
pub fn review_id(reviewer_name: &str, body: &str, date: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(reviewer_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(body.as_bytes());
    hasher.update([0u8]);
    hasher.update(date.as_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(REVIEW_ID_LEN);
    for byte in digest.iter().take(REVIEW_ID_LEN / 2) {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
