use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use revscrape_core::profile::TimingProfile;
use revscrape_core::{ScrapeData, ScrapeMethod, ScrapeProfile};
use tokio::sync::Mutex;

use super::Transport;
use crate::browser::{BrowserSession, BrowserSettings};
use crate::challenge::{ChallengeResolver, ChallengeTiming};
use crate::error::ScraperError;
use crate::extract::extract_interactive;
use crate::identity::IdentityProvider;
use crate::page::{wait_for_any_selector, BrowserPage};
use crate::rate_limit::RateLimiter;

const DOM_READY_POLL: Duration = Duration::from_millis(500);

/// Drives a real browser: the only rung that can wait out a challenge.
///
/// The session is launched on first use and reused; the mutex gives each
/// attempt exclusive use of the tab.
pub struct BrowserTransport {
    settings: BrowserSettings,
    profile: Arc<ScrapeProfile>,
    limiter: Arc<RateLimiter>,
    identity: Arc<IdentityProvider>,
    resolver: ChallengeResolver,
    session: Mutex<Option<BrowserSession>>,
}

impl BrowserTransport {
    #[must_use]
    pub fn new(
        settings: BrowserSettings,
        profile: Arc<ScrapeProfile>,
        limiter: Arc<RateLimiter>,
        identity: Arc<IdentityProvider>,
    ) -> Self {
        let resolver = ChallengeResolver::new(
            &profile.challenge,
            ChallengeTiming::from_profile(&profile.timing),
        );
        Self {
            settings,
            profile,
            limiter,
            identity,
            resolver,
            session: Mutex::new(None),
        }
    }

    async fn drive(&self, session: &BrowserSession, url: &str) -> Result<ScrapeData, ScraperError> {
        let timing = &self.profile.timing;
        session.set_user_agent(&self.identity.user_agent()).await?;
        session
            .navigate(url, TimingProfile::duration(timing.page_load_timeout_secs))
            .await?;

        let page: &dyn BrowserPage = session.page();
        let report = self.resolver.resolve(page, url).await?;
        tracing::debug!(url, ?report, "challenge check finished");

        tokio::time::sleep(TimingProfile::duration(timing.post_load_settle_secs)).await;
        let ready = wait_for_any_selector(
            page,
            &["body".to_string()],
            TimingProfile::duration(timing.dom_ready_wait_secs),
            DOM_READY_POLL,
        )
        .await;
        if ready.is_none() {
            tracing::debug!(url, "body not ready before timeout, extracting anyway");
        }

        let extraction = extract_interactive(page, url, &self.profile).await?;
        Ok(extraction.into_data(ScrapeMethod::Browser))
    }
}

#[async_trait]
impl Transport for BrowserTransport {
    fn method(&self) -> ScrapeMethod {
        ScrapeMethod::Browser
    }

    async fn fetch_and_extract(&self, url: &str) -> Result<ScrapeData, ScraperError> {
        self.limiter.acquire().await;

        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(BrowserSession::launch(&self.settings).await?);
        }
        let session = guard
            .as_ref()
            .ok_or_else(|| ScraperError::Browser("browser session missing".to_string()))?;

        let result = self.drive(session, url).await;
        if let Err(ScraperError::Browser(reason)) = &result {
            tracing::warn!(url, error = %reason, "discarding browser session");
            if let Some(broken) = guard.take() {
                broken.close().await;
            }
        }
        result
    }

    async fn shutdown(&self) {
        if let Some(session) = self.session.lock().await.take() {
            session.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[tokio::test]
    async fn launch_failure_is_a_browser_error() {
        let profile = Arc::new(ScrapeProfile::embedded().expect("embedded profile"));
        let settings = BrowserSettings {
            headless: true,
            chrome_path: Some(PathBuf::from("/nonexistent/revscrape-test-chrome")),
            launch_args: Vec::new(),
            viewport_width: 800,
            viewport_height: 600,
            stealth_script: String::new(),
        };
        let transport = BrowserTransport::new(
            settings,
            profile,
            Arc::new(RateLimiter::new(10, Duration::from_secs(60))),
            Arc::new(IdentityProvider::new(Vec::new(), false)),
        );

        let err = transport
            .fetch_and_extract("https://shop.test/p/1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScraperError::Browser(_) | ScraperError::BrowserUnavailable(_)
        ));
        assert_eq!(transport.method(), ScrapeMethod::Browser);
        transport.shutdown().await;
    }
}
