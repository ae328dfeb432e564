//! The three interchangeable fetch-and-extract strategies.

mod browser;
mod http;

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use revscrape_core::{seconds, AppConfig, ScrapeData, ScrapeMethod};

use crate::error::ScraperError;

pub use browser::BrowserTransport;
pub use http::{HttpFlavor, HttpTransport};

/// One rung of the fallback ladder.
#[async_trait]
pub trait Transport: Send + Sync {
    fn method(&self) -> ScrapeMethod;

    /// Fetches `url` and runs the extraction engine over it.
    async fn fetch_and_extract(&self, url: &str) -> Result<ScrapeData, ScraperError>;

    /// Releases long-lived resources such as a browser process.
    async fn shutdown(&self) {}
}

/// Random pause taken before each HTTP request, on top of rate limiting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestDelay {
    min: Duration,
    max: Duration,
}

impl RequestDelay {
    /// Bounds are reordered if given inverted.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    #[must_use]
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let (min, max) = config.request_delay_bounds();
        Self::new(min, max)
    }

    #[must_use]
    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let secs = rand::rng().random_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        seconds(secs)
    }
}

/// Interstitial markers that mean an HTTP response is a bot challenge rather
/// than the requested page.
pub(crate) fn looks_like_challenge(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    [
        "cf-chl-",
        "/cdn-cgi/challenge-platform/",
        "just a moment...",
        "attention required! | cloudflare",
    ]
    .iter()
    .any(|marker| lowered.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_samples_stay_within_bounds() {
        let delay = RequestDelay::new(Duration::from_secs(2), Duration::from_secs(4));
        for _ in 0..200 {
            let d = delay.sample();
            assert!(d >= Duration::from_secs(2) && d <= Duration::from_secs(4), "{d:?}");
        }
    }

    #[test]
    fn inverted_delay_bounds_are_swapped() {
        let delay = RequestDelay::new(Duration::from_secs(5), Duration::from_secs(1));
        let d = delay.sample();
        assert!(d >= Duration::from_secs(1) && d <= Duration::from_secs(5));
    }

    #[test]
    fn fixed_and_zero_delays() {
        assert_eq!(RequestDelay::none().sample(), Duration::ZERO);
        let fixed = RequestDelay::new(Duration::from_secs(3), Duration::from_secs(3));
        assert_eq!(fixed.sample(), Duration::from_secs(3));
    }

    #[test]
    fn challenge_markers() {
        assert!(looks_like_challenge("<title>Just a moment...</title>"));
        assert!(looks_like_challenge(r#"<script src="/cdn-cgi/challenge-platform/h/b/orchestrate"></script>"#));
        assert!(looks_like_challenge("<div id=\"cf-chl-widget\"></div>"));
        assert!(looks_like_challenge("<title>Attention Required! | Cloudflare</title>"));
        assert!(!looks_like_challenge("<h1>Graphics card</h1><p>Ships from Cloudflare-free warehouse</p>"));
    }
}
