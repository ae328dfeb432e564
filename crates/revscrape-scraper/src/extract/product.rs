//! Product-level fields: title, brand, price, rating, review count and
//! description, each resolved through its own selector cascade.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use revscrape_core::{ProductRecord, ScrapeProfile};
use scraper::{ElementRef, Html, Selector};

use super::cascade::{compile, element_text, first_parsed, first_some, first_text, Scope};
use super::text::{clean_opt, parse_count, parse_price, parse_rating};

const MIN_DESCRIPTION_CHARS: usize = 50;
const MAX_RATING_ICONS: usize = 5;
const RATING_ATTRS: [&str; 3] = ["data-rating", "data-value", "rating"];
const FILLED_ICON_CLASSES: [&str; 3] = ["filled", "full", "active"];

static BRAND_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:brand|manufacturer)\s*:\s*").expect("valid regex"));
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static ICON_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("i, span, svg").expect("valid selector"));

/// Values read from a live page before the static pass, used as fallbacks.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProductHints {
    /// Text of the first matching title XPath.
    pub title: Option<String>,
    /// Text of the first matching price XPath.
    pub price_text: Option<String>,
    /// `document.title` as reported by the browser.
    pub browser_title: Option<String>,
}

struct CompiledProduct {
    title: Vec<Selector>,
    brand: Vec<Selector>,
    price: Vec<Selector>,
    rating: Vec<Selector>,
    review_count: Vec<Selector>,
    description: Vec<Selector>,
    structural_title: Vec<Selector>,
}

impl CompiledProduct {
    fn new(profile: &ScrapeProfile) -> Self {
        let p = &profile.product;
        Self {
            title: compile(&p.title),
            brand: compile(&p.brand),
            price: compile(&p.price),
            rating: compile(&p.rating),
            review_count: compile(&p.review_count),
            description: compile(&p.description),
            structural_title: compile(&p.structural_title),
        }
    }
}

/// Builds the product record for `url`. Fields that cannot be found stay
/// `None`; this never fails.
pub(crate) fn extract_product(
    doc: &Html,
    url: &str,
    profile: &ScrapeProfile,
    hints: &ProductHints,
    scraped_at: DateTime<Utc>,
) -> ProductRecord {
    let selectors = CompiledProduct::new(profile);
    let scope = Scope::Document(doc);

    let title = extract_title(doc, &selectors, profile, hints);
    let brand = extract_brand(scope, &selectors.brand, title.as_deref(), &profile.brand_tokens);
    let price = first_parsed(scope, &selectors.price, parse_price)
        .or_else(|| hints.price_text.as_deref().and_then(parse_price));
    let rating = extract_rating(scope, &selectors.rating);
    let review_count = first_parsed(scope, &selectors.review_count, parse_count);
    let description = extract_description(scope, &selectors.description);

    ProductRecord {
        title,
        brand,
        price,
        rating,
        review_count,
        description,
        url: url.to_string(),
        scraped_at,
    }
}

fn extract_title(
    doc: &Html,
    selectors: &CompiledProduct,
    profile: &ScrapeProfile,
    hints: &ProductHints,
) -> Option<String> {
    let scope = Scope::Document(doc);
    let site = profile.site_name.to_lowercase();
    let page_title = |raw: Option<String>| {
        raw.and_then(|t| clean_opt(&t))
            .filter(|t| site.is_empty() || !t.to_lowercase().contains(&site))
    };

    first_some::<String>(&[
        &|| first_text(scope, &selectors.title),
        &|| hints.title.as_deref().and_then(clean_opt),
        &|| first_text(scope, &selectors.structural_title),
        &|| page_title(doc.select(&TITLE_SELECTOR).next().map(element_text)),
        &|| page_title(hints.browser_title.clone()),
    ])
}

fn extract_brand(
    scope: Scope<'_>,
    selectors: &[Selector],
    title: Option<&str>,
    tokens: &[String],
) -> Option<String> {
    first_text(scope, selectors)
        .and_then(|raw| clean_opt(&BRAND_PREFIX_RE.replace(&raw, "")))
        .or_else(|| brand_from_title(title?, tokens))
}

/// Matches a known brand token at the start of the product title.
fn brand_from_title(title: &str, tokens: &[String]) -> Option<String> {
    if tokens.is_empty() {
        return None;
    }
    let alternation = tokens
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    let re = Regex::new(&format!(r"(?i)^\s*({alternation})\b")).ok()?;
    let matched = re.captures(title)?.get(1)?.as_str().to_lowercase();
    tokens.iter().find(|t| t.to_lowercase() == matched).cloned()
}

pub(crate) fn extract_rating(scope: Scope<'_>, selectors: &[Selector]) -> Option<f64> {
    selectors.iter().find_map(|selector| {
        let el = scope.select_first(selector)?;
        rating_from_attrs(el)
            .or_else(|| parse_rating(&element_text(el)))
            .or_else(|| rating_from_icons(el))
    })
}

fn rating_from_attrs(el: ElementRef<'_>) -> Option<f64> {
    RATING_ATTRS.iter().find_map(|attr| {
        el.value()
            .attr(attr)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|r| (0.0..=5.0).contains(r))
    })
}

/// Counts filled star/egg icons inside a rating widget.
fn rating_from_icons(el: ElementRef<'_>) -> Option<f64> {
    let filled = el
        .select(&ICON_SELECTOR)
        .filter(|icon| {
            icon.value().classes().any(|class| {
                let class = class.to_lowercase();
                FILLED_ICON_CLASSES.iter().any(|f| class.contains(f))
            })
        })
        .count();
    (1..=MAX_RATING_ICONS)
        .contains(&filled)
        .then(|| u32::try_from(filled).ok().map(f64::from))
        .flatten()
}

/// Longest description candidate over the minimum length.
fn extract_description(scope: Scope<'_>, selectors: &[Selector]) -> Option<String> {
    selectors
        .iter()
        .flat_map(|s| scope.select(s))
        .map(element_text)
        .filter(|text| text.chars().count() > MIN_DESCRIPTION_CHARS)
        .max_by_key(|text| text.chars().count())
}
