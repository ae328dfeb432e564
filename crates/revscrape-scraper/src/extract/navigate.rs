//! Bringing the reviews section into the DOM on a live page.

use std::time::Duration;

use revscrape_core::profile::TimingProfile;
use revscrape_core::ScrapeProfile;
use serde_json::Value;

use crate::page::{
    click_css_containing, click_xpath, scroll_to_fraction, wait_for_any_selector, BrowserPage,
};

const CONTAINER_POLL: Duration = Duration::from_millis(500);

/// Finds a visible tab whose label reads like "Reviews (123)" and clicks it.
const TAB_SEARCH_SCRIPT: &str = r#"(() => {
  const candidates = Array.from(document.querySelectorAll('a, button, div[role="tab"]'));
  const tab = candidates.find(el => {
    const text = (el.textContent || '').toLowerCase();
    return text.includes('reviews') && text.includes('(')
      && !text.includes('specs') && !text.includes('q &');
  });
  if (!tab) return null;
  tab.scrollIntoView(true);
  tab.click();
  return (tab.textContent || '').trim();
})()"#;

/// How the reviews section was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReviewsNavigation {
    /// A tab or link was clicked; carries its label.
    Clicked(String),
    /// Nothing clickable was found, so the page was scrolled instead.
    Scrolled,
}

/// Tries a scripted tab search, then the XPath list, then the CSS list,
/// stopping at the first click. After a click, waits for a reviews container
/// but carries on regardless once the wait runs out.
pub(crate) async fn navigate_to_reviews(
    page: &dyn BrowserPage,
    profile: &ScrapeProfile,
) -> ReviewsNavigation {
    let Some(label) = click_reviews_tab(page, profile).await else {
        tracing::debug!("no reviews tab found, scrolling to page middle");
        scroll_to_fraction(page, 0.5).await;
        return ReviewsNavigation::Scrolled;
    };

    tracing::info!(tab = %label, "opened reviews tab");
    let timing = &profile.timing;
    tokio::time::sleep(TimingProfile::duration(timing.review_tab_settle_secs)).await;
    let container = wait_for_any_selector(
        page,
        &profile.reviews.container,
        TimingProfile::duration(timing.reviews_container_wait_secs),
        CONTAINER_POLL,
    )
    .await;
    if container.is_none() {
        tracing::debug!("reviews container did not appear, continuing");
    }
    ReviewsNavigation::Clicked(label)
}

async fn click_reviews_tab(page: &dyn BrowserPage, profile: &ScrapeProfile) -> Option<String> {
    match page.evaluate(TAB_SEARCH_SCRIPT).await {
        Ok(Value::String(label)) => return Some(label),
        Ok(_) => {}
        Err(e) => tracing::debug!(error = %e, "scripted tab search failed"),
    }

    for xpath in &profile.reviews.reviews_tab_xpath {
        if let Some(label) = click_xpath(page, xpath).await {
            return Some(label);
        }
    }

    for selector in &profile.reviews.reviews_tab {
        if let Some(label) = click_css_containing(page, selector, "reviews").await {
            return Some(label);
        }
    }
    None
}
