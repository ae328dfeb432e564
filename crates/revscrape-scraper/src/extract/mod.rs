//! Product and review extraction.
//!
//! Review tiers run in a fixed order and the first non-empty tier wins:
//! JSON-LD, embedded application-state JSON, selector cascades, then (on a
//! live page only) free-text heuristics.

mod cascade;
mod embedded;
mod heuristic;
mod jsonld;
mod navigate;
mod product;
mod review_items;
pub mod text;

use chrono::{DateTime, Utc};
use revscrape_core::{
    ProductRecord, ReviewRecord, ReviewSource, ScrapeData, ScrapeMethod, ScrapeProfile,
};
use scraper::Html;

use crate::error::ScraperError;
use crate::page::{xpath_text, BrowserPage};

use self::navigate::navigate_to_reviews;
use self::product::{extract_product, ProductHints};

/// What one page yielded.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub product: ProductRecord,
    pub reviews: Vec<ReviewRecord>,
    /// Tier that produced `reviews`; `None` when no tier found any.
    pub review_source: Option<ReviewSource>,
}

impl Extraction {
    #[must_use]
    pub fn into_data(self, method: ScrapeMethod) -> ScrapeData {
        ScrapeData::new(self.product, self.reviews, method, self.review_source)
    }
}

type Tiered = Option<(Vec<ReviewRecord>, ReviewSource)>;

/// Extracts from fetched markup, without a live page.
///
/// The heuristic tier is not applied here; static pages fall back to
/// selector cascades over the whole document.
///
/// # Errors
///
/// Returns [`ScraperError::EmptyDocument`] when the markup has no content.
pub fn extract_static(
    html: &str,
    url: &str,
    profile: &ScrapeProfile,
) -> Result<Extraction, ScraperError> {
    ensure_not_empty(html, url)?;
    let scraped_at = Utc::now();

    let doc = Html::parse_document(html);
    let product = extract_product(&doc, url, profile, &ProductHints::default(), scraped_at);
    let tiered = structured_reviews(html, url, scraped_at).or_else(|| {
        tier(
            review_items::extract_selector_reviews(&doc, profile, url, scraped_at),
            ReviewSource::Selectors,
        )
    });

    Ok(assemble(product, tiered))
}

/// Extracts from a live page, navigating to the reviews section when the
/// structured tiers come up empty.
///
/// # Errors
///
/// Returns [`ScraperError::EmptyDocument`] for a blank page, or the page's
/// error if its content cannot be read.
pub async fn extract_interactive(
    page: &dyn BrowserPage,
    url: &str,
    profile: &ScrapeProfile,
) -> Result<Extraction, ScraperError> {
    let html = page.content().await?;
    ensure_not_empty(&html, url)?;
    let scraped_at = Utc::now();

    let hints = ProductHints {
        title: first_xpath_text(page, &profile.product_xpath.title).await,
        price_text: first_xpath_text(page, &profile.product_xpath.price).await,
        browser_title: page.title().await.ok().flatten(),
    };
    let product = product_from_markup(&html, url, profile, &hints, scraped_at);

    if let Some(found) = structured_reviews(&html, url, scraped_at) {
        return Ok(assemble(product, Some(found)));
    }

    let navigation = navigate_to_reviews(page, profile).await;
    tracing::debug!(?navigation, "reviews navigation finished");
    let html = page.content().await?;
    Ok(assemble(product, dom_reviews(&html, profile, url, scraped_at)))
}

fn ensure_not_empty(html: &str, url: &str) -> Result<(), ScraperError> {
    if html.trim().is_empty() {
        return Err(ScraperError::EmptyDocument { url: url.to_string() });
    }
    Ok(())
}

async fn first_xpath_text(page: &dyn BrowserPage, xpaths: &[String]) -> Option<String> {
    for xpath in xpaths {
        if let Some(text) = xpath_text(page, xpath).await {
            return Some(text);
        }
    }
    None
}

// Parsed documents are not `Send`, so they live only inside these sync helpers.

fn product_from_markup(
    html: &str,
    url: &str,
    profile: &ScrapeProfile,
    hints: &ProductHints,
    scraped_at: DateTime<Utc>,
) -> ProductRecord {
    let doc = Html::parse_document(html);
    extract_product(&doc, url, profile, hints, scraped_at)
}

fn dom_reviews(
    html: &str,
    profile: &ScrapeProfile,
    url: &str,
    scraped_at: DateTime<Utc>,
) -> Tiered {
    let doc = Html::parse_document(html);
    tier(
        review_items::extract_selector_reviews(&doc, profile, url, scraped_at),
        ReviewSource::Selectors,
    )
    .or_else(|| {
        tier(
            heuristic::extract_heuristic_reviews(&doc, profile, url, scraped_at),
            ReviewSource::Heuristic,
        )
    })
}

fn structured_reviews(html: &str, url: &str, scraped_at: DateTime<Utc>) -> Tiered {
    tier(jsonld::extract_jsonld_reviews(html, url, scraped_at), ReviewSource::JsonLd).or_else(
        || {
            tier(
                embedded::extract_embedded_reviews(html, url, scraped_at),
                ReviewSource::EmbeddedJson,
            )
        },
    )
}

fn tier(reviews: Vec<ReviewRecord>, source: ReviewSource) -> Tiered {
    (!reviews.is_empty()).then_some((reviews, source))
}

fn assemble(product: ProductRecord, tiered: Tiered) -> Extraction {
    match tiered {
        Some((reviews, source)) => {
            tracing::debug!(count = reviews.len(), source = ?source, "reviews extracted");
            Extraction {
                product,
                reviews,
                review_source: Some(source),
            }
        }
        None => Extraction {
            product,
            reviews: Vec::new(),
            review_source: None,
        },
    }
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
