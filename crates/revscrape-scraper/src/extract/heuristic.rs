//! Last-resort review recovery from free text, used on the browser path
//! when no structured or selector-based tier finds anything.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use revscrape_core::{ReviewDraft, ReviewRecord, ScrapeProfile};
use scraper::{ElementRef, Html, Selector};

use super::cascade::element_lines;
use super::text::contains_any;

const MAX_CANDIDATES: usize = 50;
const MIN_CANDIDATE_CHARS: usize = 100;
const MIN_REVIEW_CHARS: usize = 20;
const MIN_CONTENT_LINE_CHARS: usize = 10;
const MAX_TITLE_CHARS: usize = 100;
const DEDUPE_PREFIX_CHARS: usize = 200;
const METADATA_MARKERS: [&str; 5] = ["verified", "by ", "rating", "stars", "out of"];
const VERIFIED_MARKERS: [&str; 3] = ["verified", "owner", "purchased"];

static COMMENTS_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.comments").expect("valid selector"));
static DIV_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div").expect("valid selector"));

static NAME_RES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"By\s+([A-Za-z .]+?)(?:\s|$)").expect("valid regex"),
        Regex::new(r"([A-Za-z][A-Za-z .]*?)\s+(?i:verified|owner)").expect("valid regex"),
        Regex::new(r"^([A-Za-z .]+?)(?:\s{2,}|\n)").expect("valid regex"),
    ]
});
static RATING_RES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)(\d+)(?:\s*out\s*of\s*5|\s*/\s*5|\s*stars?)").expect("valid regex"),
        Regex::new(r"(?i)Rating:\s*(\d+)").expect("valid regex"),
        Regex::new(r"(?i)(\d+)\s*star").expect("valid regex"),
    ]
});
static DATE_RES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})").expect("valid regex"),
        Regex::new(r"([A-Za-z]+\s+\d{1,2},?\s+\d{4})").expect("valid regex"),
        Regex::new(r"(\d{4}-\d{2}-\d{2})").expect("valid regex"),
    ]
});

pub(crate) fn extract_heuristic_reviews(
    doc: &Html,
    profile: &ScrapeProfile,
    product_url: &str,
    scraped_at: DateTime<Utc>,
) -> Vec<ReviewRecord> {
    candidates(doc, &profile.reviews.signal_phrases)
        .into_iter()
        .filter_map(|node| {
            let text = element_lines(node).join("\n");
            review_from_text(&text).into_record(product_url, scraped_at)
        })
        .collect()
}

/// `div.comments` blocks plus the innermost divs carrying a review signal,
/// deduplicated on their leading text.
fn candidates<'a>(doc: &'a Html, signals: &[String]) -> Vec<ElementRef<'a>> {
    let comments: Vec<ElementRef<'a>> = doc.select(&COMMENTS_SELECTOR).collect();
    let signalled: Vec<ElementRef<'a>> = doc
        .select(&DIV_SELECTOR)
        .filter(|div| {
            let text = div.text().collect::<String>().to_lowercase();
            text.chars().count() > MIN_CANDIDATE_CHARS
                && !text.contains("summary")
                && contains_any(&text, signals)
        })
        .collect();

    let enclosing: HashSet<_> = signalled
        .iter()
        .flat_map(|div| div.ancestors().map(|a| a.id()))
        .collect();

    let mut seen = HashSet::new();
    comments
        .into_iter()
        .chain(signalled.into_iter().filter(|div| !enclosing.contains(&div.id())))
        .filter(|node| {
            let prefix: String = node
                .text()
                .collect::<String>()
                .chars()
                .take(DEDUPE_PREFIX_CHARS)
                .collect();
            !prefix.trim().is_empty() && seen.insert(prefix)
        })
        .take(MAX_CANDIDATES)
        .collect()
}

fn review_from_text(text: &str) -> ReviewDraft {
    if text.chars().count() < MIN_REVIEW_CHARS {
        return ReviewDraft::default();
    }
    let lowered = text.to_lowercase();

    let content: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| {
            let l = line.to_lowercase();
            !METADATA_MARKERS.iter().any(|m| l.contains(m))
                && line.chars().count() > MIN_CONTENT_LINE_CHARS
        })
        .collect();

    let (title, body) = match content.as_slice() {
        [] => (None, None),
        [only] => (None, Some((*only).to_string())),
        [first, rest @ ..] if first.chars().count() < MAX_TITLE_CHARS => {
            (Some((*first).to_string()), Some(rest.join(" ")))
        }
        all => (None, Some(all.join(" "))),
    };

    ReviewDraft {
        reviewer_name: reviewer_name(text),
        rating: RATING_RES.iter().find_map(|re| {
            re.captures(text)
                .and_then(|c| c[1].parse::<u8>().ok())
                .filter(|r| (1..=5).contains(r))
                .map(f64::from)
        }),
        title,
        body,
        date: DATE_RES
            .iter()
            .find_map(|re| re.captures(text).map(|c| c[1].to_string())),
        verified_purchase: VERIFIED_MARKERS.iter().any(|m| lowered.contains(m)),
        helpful_count: None,
    }
}

fn reviewer_name(text: &str) -> Option<String> {
    NAME_RES.iter().find_map(|re| {
        let name = re.captures(text)?.get(1)?.as_str().trim().to_string();
        (name.len() > 1 && name.len() < 50).then_some(name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> Vec<ReviewRecord> {
        let profile = ScrapeProfile::embedded().expect("embedded profile");
        let doc = Html::parse_document(html);
        extract_heuristic_reviews(&doc, &profile, "https://shop.test/p/1", Utc::now())
    }

    #[test]
    fn recovers_fields_from_comment_block() {
        let html = r#"
            <div class="comments">
              <div>By Morgan</div>
              <div>Verified Owner</div>
              <div>5 out of 5 eggs</div>
              <div>Best upgrade this year</div>
              <div>Pros: quiet fans, great thermals under sustained load.</div>
              <div>Cons: the box was slightly dented on arrival.</div>
              <div>3/14/2024</div>
            </div>"#;
        let reviews = extract(html);
        assert_eq!(reviews.len(), 1);
        let review = &reviews[0];
        assert_eq!(review.reviewer_name, "Morgan");
        assert_eq!(review.rating, Some(5.0));
        assert_eq!(review.title.as_deref(), Some("Best upgrade this year"));
        assert!(review.body.as_deref().unwrap().starts_with("Pros: quiet fans"));
        assert!(review.verified_purchase);
        assert_eq!(review.date.as_ref().map(|d| d.raw.as_str()), Some("3/14/2024"));
    }

    #[test]
    fn candidates_are_capped_per_page() {
        let cards: String = (0..60)
            .map(|i| {
                format!(
                    "<div>Pros: unit {i} stayed cool and quiet under heavy load all week long, \
                     and the fans never ramped up once during long gaming sessions.</div>"
                )
            })
            .collect();
        let html = format!("<html><body>{cards}</body></html>");
        assert_eq!(extract(&html).len(), MAX_CANDIDATES);
    }

    #[test]
    fn candidate_with_only_metadata_lines_is_dropped() {
        let html = r#"
            <div class="card">
              <p>Verified Owner</p>
              <p>5 out of 5 stars</p>
              <p>Rating: 5 stars, posted by a verified buyer from the regional store location</p>
            </div>"#;
        assert!(extract(html).is_empty());
    }

    #[test]
    fn summary_blocks_and_short_divs_are_not_candidates() {
        let html = r#"
            <div>Pros: short</div>
            <div>Summary of what everyone thinks. Pros: price, performance, noise levels and
                 thermals are all praised across hundreds of reviews for this product.</div>"#;
        assert!(extract(html).is_empty());
    }

    #[test]
    fn only_innermost_signal_divs_are_used() {
        let html = r#"
            <div id="page">
              <div class="card">
                <p>Jordan</p>
                <p>Overall review: the card works exactly as advertised out of the box.</p>
                <p>It handled every benchmark I ran without any thermal throttling at all.</p>
              </div>
            </div>"#;
        let reviews = extract(html);
        assert_eq!(reviews.len(), 1);
    }

    #[test]
    fn rating_outside_one_to_five_is_ignored() {
        let draft =
            review_from_text("Someone\n9 stars would buy again\nThis product is fantastic overall.");
        assert_eq!(draft.rating, None);
    }

    #[test]
    fn long_first_line_folds_into_body() {
        let long = "a".repeat(120);
        let draft = review_from_text(&format!("{long}\nsecond line of content"));
        assert_eq!(draft.title, None);
        assert!(draft.body.unwrap().starts_with(&long));
    }

    #[test]
    fn name_from_verified_suffix() {
        assert_eq!(reviewer_name("Pat Lee Verified Owner").as_deref(), Some("Pat Lee"));
    }
}
