//! Tolerant parsers for the free text found in product and review markup.

use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static DISALLOWED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[^\w\s\-.,!?()$%&@#'"/:;+*]"#).expect("valid regex")
});
static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$?(\d+(?:\.\d{1,2})?)").expect("valid regex"));
static RATING_RES: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:out\s*of\s*5|/\s*5|stars?)").expect("valid regex"),
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*eggs?").expect("valid regex"),
        Regex::new(r"(?i)rating[:\s]*(\d+(?:\.\d+)?)").expect("valid regex"),
        // Unit-less last resort; may pick up unrelated numbers.
        Regex::new(r"(\d+(?:\.\d+)?)").expect("valid regex"),
    ]
});
static COUNT_RES: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)\((\d+(?:,\d{3})*)\s*reviews?\)").expect("valid regex"),
        Regex::new(r"(?i)(\d+(?:,\d{3})*)\s*reviews?").expect("valid regex"),
        Regex::new(r"(?i)(\d+(?:,\d{3})*)\s*ratings?").expect("valid regex"),
        Regex::new(r"(\d+(?:,\d{3})*)").expect("valid regex"),
    ]
});

/// Collapses whitespace and strips characters outside a conservative set.
#[must_use]
pub fn clean_text(text: &str) -> String {
    let collapsed = WHITESPACE_RE.replace_all(text.trim(), " ");
    DISALLOWED_RE.replace_all(&collapsed, "").trim().to_string()
}

/// `clean_text`, mapping an empty result to `None`.
#[must_use]
pub fn clean_opt(text: &str) -> Option<String> {
    let cleaned = clean_text(text);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Parses a price such as `"$1,299.99"`. Text without digits yields `None`.
#[must_use]
pub fn parse_price(text: &str) -> Option<f64> {
    let without_separators = text.replace(',', "");
    PRICE_RE
        .captures(&without_separators)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Parses a rating phrased as `"4.5 out of 5"`, `"4/5"`, `"5 stars"`,
/// `"4 eggs"`, `"Rating: 4"` or a bare number.
///
/// Patterns are tried in order; a match outside `[0, 5]` moves on to the
/// next pattern rather than being clamped.
#[must_use]
pub fn parse_rating(text: &str) -> Option<f64> {
    RATING_RES.iter().find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .filter(|r| (0.0..=5.0).contains(r))
    })
}

/// Parses a review count such as `"(1,234 reviews)"` or `"87 ratings"`.
#[must_use]
pub fn parse_count(text: &str) -> Option<u32> {
    COUNT_RES.iter().find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().replace(',', "").parse::<u32>().ok())
    })
}

/// True if `text` contains any of `phrases`, ignoring case.
#[must_use]
pub fn contains_any(text: &str, phrases: &[String]) -> bool {
    let lowered = text.to_lowercase();
    phrases
        .iter()
        .any(|p| !p.is_empty() && lowered.contains(&p.to_lowercase()))
}
