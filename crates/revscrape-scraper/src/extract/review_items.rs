//! Per-review extraction through selector cascades.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use revscrape_core::{ReviewDraft, ReviewRecord, ScrapeProfile};
use scraper::{ElementRef, Html, Selector};

use super::cascade::{compile, element_text, first_parsed, first_text, Scope};
use super::product::extract_rating;
use super::text::{contains_any, parse_count};

struct CompiledReviews {
    container: Vec<Selector>,
    individual: Vec<Selector>,
    items: Vec<Selector>,
    reviewer_name: Vec<Selector>,
    rating: Vec<Selector>,
    title: Vec<Selector>,
    body: Vec<Selector>,
    date: Vec<Selector>,
    verified: Vec<Selector>,
    helpful: Vec<Selector>,
}

impl CompiledReviews {
    fn new(profile: &ScrapeProfile) -> Self {
        let r = &profile.reviews;
        Self {
            container: compile(&r.container),
            individual: compile(&r.individual_reviews_container),
            items: compile(&r.review_item),
            reviewer_name: compile(&r.reviewer_name),
            rating: compile(&r.rating),
            title: compile(&r.title),
            body: compile(&r.body),
            date: compile(&r.date),
            verified: compile(&r.verified),
            helpful: compile(&r.helpful),
        }
    }
}

/// Extracts reviews from the reviews section, or the whole document when no
/// section is found.
///
/// Item selectors are tried in order; the first one yielding at least one
/// valid review wins.
pub(crate) fn extract_selector_reviews(
    doc: &Html,
    profile: &ScrapeProfile,
    product_url: &str,
    scraped_at: DateTime<Utc>,
) -> Vec<ReviewRecord> {
    let selectors = CompiledReviews::new(profile);
    let scope = review_scope(doc, &selectors);

    for item_selector in &selectors.items {
        let items = outermost(scope.select(item_selector));
        let reviews: Vec<ReviewRecord> = items
            .into_iter()
            .filter(|item| !is_summary_block(*item, profile))
            .filter_map(|item| {
                review_from_item(item, &selectors, profile).into_record(product_url, scraped_at)
            })
            .collect();
        if !reviews.is_empty() {
            tracing::debug!(count = reviews.len(), "selector tier matched reviews");
            return reviews;
        }
    }
    Vec::new()
}

fn review_scope<'a>(doc: &'a Html, selectors: &CompiledReviews) -> Scope<'a> {
    let Some(container) = Scope::Document(doc).first_match(&selectors.container) else {
        return Scope::Document(doc);
    };
    let section = Scope::Element(container);
    section
        .first_match(&selectors.individual)
        .map_or(section, Scope::Element)
}

/// Drops matches nested inside another match of the same selector.
fn outermost(items: Vec<ElementRef<'_>>) -> Vec<ElementRef<'_>> {
    let ids: HashSet<_> = items.iter().map(|item| item.id()).collect();
    items
        .into_iter()
        .filter(|item| !item.ancestors().any(|a| ids.contains(&a.id())))
        .collect()
}

/// AI-generated or aggregate summary blocks look like reviews but are not.
fn is_summary_block(item: ElementRef<'_>, profile: &ScrapeProfile) -> bool {
    let class = item.value().attr("class").unwrap_or("");
    contains_any(class, &profile.reviews.summary_classes)
        || contains_any(&element_text(item), &profile.reviews.summary_phrases)
}

fn review_from_item(
    item: ElementRef<'_>,
    selectors: &CompiledReviews,
    profile: &ScrapeProfile,
) -> ReviewDraft {
    let scope = Scope::Element(item);
    let verified_badge = first_text(scope, &selectors.verified);

    ReviewDraft {
        reviewer_name: first_text(scope, &selectors.reviewer_name),
        rating: extract_rating(scope, &selectors.rating),
        title: first_text(scope, &selectors.title),
        body: first_text(scope, &selectors.body),
        date: review_date(scope, &selectors.date),
        verified_purchase: verified_badge
            .is_some_and(|badge| contains_any(&badge, &profile.verified_phrases))
            || contains_any(&element_text(item), &profile.verified_phrases),
        helpful_count: first_parsed(scope, &selectors.helpful, parse_count),
    }
}

/// Prefers a machine-readable `datetime` attribute over display text.
fn review_date(scope: Scope<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|s| {
        let el = scope.select_first(s)?;
        el.value()
            .attr("datetime")
            .map(str::to_string)
            .or_else(|| Some(element_text(el)))
            .filter(|d| !d.trim().is_empty())
    })
}
