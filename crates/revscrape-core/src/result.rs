//! The uniform envelope returned by every transport attempt and by the
//! orchestrator.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::records::{ProductRecord, ReviewRecord};

/// Which strategy produced a result, or which one a caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeMethod {
    Browser,
    AntiBot,
    PlainHttp,
    /// Try every strategy in order until one succeeds.
    Fallback,
    /// Reported when the fallback ladder ran out of strategies.
    AllFailed,
}

impl ScrapeMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::AntiBot => "anti_bot",
            Self::PlainHttp => "plain_http",
            Self::Fallback => "fallback",
            Self::AllFailed => "all_failed",
        }
    }
}

impl fmt::Display for ScrapeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScrapeMethod {
    type Err = String;

    /// Parses a requestable method. `all_failed` is output-only and rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "browser" => Ok(Self::Browser),
            "anti_bot" | "antibot" => Ok(Self::AntiBot),
            "plain_http" | "plain" | "http" => Ok(Self::PlainHttp),
            "fallback" => Ok(Self::Fallback),
            other => Err(format!(
                "unknown scrape method {other:?} (expected browser, anti_bot, plain_http or fallback)"
            )),
        }
    }
}

/// Which review extraction tier produced the review list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewSource {
    JsonLd,
    EmbeddedJson,
    Selectors,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeData {
    pub product: ProductRecord,
    pub reviews: Vec<ReviewRecord>,
    pub total_reviews_found: usize,
    pub extraction_method: ScrapeMethod,
    pub review_source: Option<ReviewSource>,
}

impl ScrapeData {
    #[must_use]
    pub fn new(
        product: ProductRecord,
        reviews: Vec<ReviewRecord>,
        extraction_method: ScrapeMethod,
        review_source: Option<ReviewSource>,
    ) -> Self {
        Self {
            total_reviews_found: reviews.len(),
            product,
            reviews,
            extraction_method,
            review_source,
        }
    }

    /// Keeps at most `max_reviews` reviews and recomputes the reported count.
    pub fn truncate_reviews(&mut self, max_reviews: usize) {
        self.reviews.truncate(max_reviews);
        self.total_reviews_found = self.reviews.len();
    }
}

/// Outcome of one attempt. Carries data on success and a message on failure,
/// never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResult {
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
    timestamp: DateTime<Utc>,
    method: ScrapeMethod,
}

impl ScrapeResult {
    #[must_use]
    pub fn succeeded(method: ScrapeMethod, data: ScrapeData) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
            method,
        }
    }

    #[must_use]
    pub fn failed(method: ScrapeMethod, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
            method,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    #[must_use]
    pub fn data(&self) -> Option<&ScrapeData> {
        self.data.as_ref()
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn method(&self) -> ScrapeMethod {
        self.method
    }

    /// Keeps at most `max_reviews` reviews of a successful result.
    pub fn truncate_reviews(&mut self, max_reviews: usize) {
        if let Some(data) = &mut self.data {
            data.truncate_reviews(max_reviews);
        }
    }

    /// Converts into the external response shape.
    #[must_use]
    pub fn into_response(self) -> ScrapeResponse {
        match self.data {
            Some(data) if self.success => ScrapeResponse::Completed(data),
            _ => ScrapeResponse::Failed {
                error: self
                    .error
                    .unwrap_or_else(|| "scrape produced no data".to_string()),
            },
        }
    }
}

/// The shape handed to external callers: either the data or `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScrapeResponse {
    Completed(ScrapeData),
    Failed { error: String },
}
