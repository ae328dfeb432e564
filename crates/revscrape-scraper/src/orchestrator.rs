//! The fallback ladder: browser, then anti-bot HTTP, then plain HTTP.

use std::sync::Arc;

use revscrape_core::{AppConfig, ScrapeMethod, ScrapeProfile, ScrapeResponse, ScrapeResult};

use crate::browser::BrowserSettings;
use crate::error::ScraperError;
use crate::identity::IdentityProvider;
use crate::rate_limit::RateLimiter;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::transport::{BrowserTransport, HttpFlavor, HttpTransport, RequestDelay, Transport};

/// Composes the transports with one shared rate limiter and identity
/// provider. Strategies run sequentially, never in parallel.
pub struct ReviewScraper {
    transports: Vec<Box<dyn Transport>>,
    retry: RetryPolicy,
}

impl ReviewScraper {
    /// Builds the standard ladder from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if an HTTP client cannot be constructed.
    pub fn new(config: &AppConfig, profile: Arc<ScrapeProfile>) -> Result<Self, ScraperError> {
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit_calls,
            config.rate_limit_window(),
        ));
        let identity = Arc::new(IdentityProvider::new(
            profile.identity.user_agents.clone(),
            config.randomize_user_agent,
        ));
        let delay = RequestDelay::from_config(config);

        let browser = BrowserTransport::new(
            BrowserSettings::from_config(config, &profile),
            Arc::clone(&profile),
            Arc::clone(&limiter),
            Arc::clone(&identity),
        );
        let anti_bot = HttpTransport::new(
            HttpFlavor::AntiBot,
            Arc::clone(&profile),
            Arc::clone(&limiter),
            Arc::clone(&identity),
            delay,
            config.request_timeout(),
        )?;
        let plain = HttpTransport::new(
            HttpFlavor::Plain,
            profile,
            limiter,
            identity,
            delay,
            config.request_timeout(),
        )?;

        Ok(Self::with_transports(
            vec![Box::new(browser), Box::new(anti_bot), Box::new(plain)],
            RetryPolicy::from_config(config),
        ))
    }

    /// Uses `transports` as the ladder, in the order given.
    #[must_use]
    pub fn with_transports(transports: Vec<Box<dyn Transport>>, retry: RetryPolicy) -> Self {
        Self { transports, retry }
    }

    /// Scrapes `url` with one strategy, or walks the ladder for
    /// [`ScrapeMethod::Fallback`]. Never returns an error: failures are
    /// reported in the result.
    pub async fn scrape(&self, url: &str, method: ScrapeMethod) -> ScrapeResult {
        if let Err(e) = validate_url(url) {
            tracing::warn!(url, error = %e, "rejecting url");
            return ScrapeResult::failed(method, e.to_string());
        }

        match method {
            ScrapeMethod::Fallback => self.scrape_with_fallback(url).await,
            ScrapeMethod::AllFailed => {
                ScrapeResult::failed(method, "all_failed is not a scrape method")
            }
            explicit => match self.transports.iter().find(|t| t.method() == explicit) {
                Some(transport) => match self.attempt(transport.as_ref(), url).await {
                    Ok(result) => result,
                    Err(e) => ScrapeResult::failed(explicit, e.to_string()),
                },
                None => ScrapeResult::failed(
                    explicit,
                    format!("no transport configured for {explicit}"),
                ),
            },
        }
    }

    async fn scrape_with_fallback(&self, url: &str) -> ScrapeResult {
        let mut last_error = String::from("no transports configured");
        for transport in &self.transports {
            match self.attempt(transport.as_ref(), url).await {
                Ok(result) => return result,
                Err(e) => {
                    tracing::warn!(url, method = %transport.method(), error = %e, "strategy failed");
                    last_error = e.to_string();
                }
            }
        }
        let err = ScraperError::AllStrategiesFailed { last_error };
        ScrapeResult::failed(ScrapeMethod::AllFailed, err.to_string())
    }

    async fn attempt(
        &self,
        transport: &dyn Transport,
        url: &str,
    ) -> Result<ScrapeResult, ScraperError> {
        let method = transport.method();
        tracing::info!(url, %method, "trying strategy");
        let data = retry_with_backoff(&self.retry, move || transport.fetch_and_extract(url)).await?;
        tracing::info!(
            url,
            %method,
            reviews = data.total_reviews_found,
            "strategy succeeded"
        );
        Ok(ScrapeResult::succeeded(method, data))
    }

    /// [`Self::scrape`], keeping at most `max_reviews` reviews and
    /// recomputing the reported count.
    pub async fn scrape_with_limit(
        &self,
        url: &str,
        method: ScrapeMethod,
        max_reviews: usize,
    ) -> ScrapeResult {
        let mut result = self.scrape(url, method).await;
        result.truncate_reviews(max_reviews);
        result
    }

    /// Fallback scrape shaped for external callers, keeping at most
    /// `max_reviews` reviews.
    pub async fn scrape_product_and_reviews(
        &self,
        url: &str,
        max_reviews: usize,
    ) -> ScrapeResponse {
        self.scrape_with_limit(url, ScrapeMethod::Fallback, max_reviews)
            .await
            .into_response()
    }

    /// Releases every transport's resources.
    pub async fn close(self) {
        for transport in &self.transports {
            transport.shutdown().await;
        }
    }
}

/// Requires an http(s) URL with a host.
fn validate_url(url: &str) -> Result<(), ScraperError> {
    let invalid = |reason: &str| ScraperError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };
    let parsed = reqwest::Url::parse(url.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if !parsed.has_host() {
        return Err(invalid("missing host"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
