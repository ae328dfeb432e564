//! The slice of browser automation the engine relies on.
//!
//! Challenge handling and review-tab navigation are written against
//! [`BrowserPage`] rather than a concrete CDP handle, so both can be driven
//! by scripted pages in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ScraperError;

#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Current serialised DOM.
    async fn content(&self) -> Result<String, ScraperError>;

    async fn title(&self) -> Result<Option<String>, ScraperError>;

    async fn current_url(&self) -> Result<Option<String>, ScraperError>;

    /// Evaluates a synchronous JavaScript expression and returns its JSON value.
    /// `undefined` comes back as `Value::Null`.
    async fn evaluate(&self, script: &str) -> Result<Value, ScraperError>;

    /// Clicks the first element matching `selector`. Returns `false` when
    /// nothing matched.
    async fn click_first(&self, selector: &str) -> Result<bool, ScraperError>;

    async fn reload(&self) -> Result<(), ScraperError>;
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Text of the first node matching `xpath`, if any.
pub async fn xpath_text(page: &dyn BrowserPage, xpath: &str) -> Option<String> {
    let script = format!(
        "(() => {{ try {{ const n = document.evaluate({}, document, null, \
         XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue; \
         return n ? (n.textContent || '').trim() : null; }} catch (e) {{ return null; }} }})()",
        js_string(xpath)
    );
    match page.evaluate(&script).await {
        Ok(Value::String(text)) if !text.trim().is_empty() => Some(text),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(xpath, error = %e, "xpath lookup failed");
            None
        }
    }
}

/// Scrolls the first node matching `xpath` into view and clicks it.
/// Returns the clicked node's text.
pub async fn click_xpath(page: &dyn BrowserPage, xpath: &str) -> Option<String> {
    let script = format!(
        "(() => {{ try {{ const n = document.evaluate({}, document, null, \
         XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue; \
         if (!n || n.offsetParent === null) return null; \
         n.scrollIntoView(true); n.click(); return (n.textContent || '').trim(); }} \
         catch (e) {{ return null; }} }})()",
        js_string(xpath)
    );
    match page.evaluate(&script).await {
        Ok(Value::String(text)) => Some(text),
        _ => None,
    }
}

/// Clicks the first node matching the CSS `selector` whose text contains
/// `needle` (case-insensitive). Invalid selectors are treated as no match.
pub async fn click_css_containing(
    page: &dyn BrowserPage,
    selector: &str,
    needle: &str,
) -> Option<String> {
    let script = format!(
        "(() => {{ try {{ const needle = {}.toLowerCase(); \
         const n = Array.from(document.querySelectorAll({})) \
           .find(el => (el.textContent || '').toLowerCase().includes(needle)); \
         if (!n) return null; n.scrollIntoView(true); n.click(); \
         return (n.textContent || '').trim(); }} catch (e) {{ return null; }} }})()",
        js_string(needle),
        js_string(selector)
    );
    match page.evaluate(&script).await {
        Ok(Value::String(text)) => Some(text),
        _ => None,
    }
}

pub async fn has_selector(page: &dyn BrowserPage, selector: &str) -> bool {
    let script = format!(
        "(() => {{ try {{ return document.querySelector({}) !== null; }} catch (e) {{ return false; }} }})()",
        js_string(selector)
    );
    matches!(page.evaluate(&script).await, Ok(Value::Bool(true)))
}

/// Polls until any of `selectors` is present or `timeout` elapses.
/// Returns the selector that matched.
pub async fn wait_for_any_selector(
    page: &dyn BrowserPage,
    selectors: &[String],
    timeout: Duration,
    poll: Duration,
) -> Option<String> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        for selector in selectors {
            if has_selector(page, selector).await {
                return Some(selector.clone());
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(poll).await;
    }
}

/// Scrolls to `fraction` of the document height.
pub async fn scroll_to_fraction(page: &dyn BrowserPage, fraction: f64) {
    let script = format!(
        "window.scrollTo(0, document.body ? document.body.scrollHeight * {fraction} : 0)"
    );
    if let Err(e) = page.evaluate(&script).await {
        tracing::debug!(error = %e, "scroll failed");
    }
}
