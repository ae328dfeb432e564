use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::Client;
use revscrape_core::{ScrapeData, ScrapeMethod, ScrapeProfile};

use super::{looks_like_challenge, RequestDelay, Transport};
use crate::error::ScraperError;
use crate::extract::extract_static;
use crate::identity::IdentityProvider;
use crate::rate_limit::RateLimiter;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const CURL_MAX_FILESIZE: &str = "10485760";

/// Which HTTP client persona to present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpFlavor {
    /// Browser header set, cookie jar, compression, and a curl attempt first.
    AntiBot,
    /// A vanilla client; the cheapest rung.
    Plain,
}

impl HttpFlavor {
    #[must_use]
    pub fn method(self) -> ScrapeMethod {
        match self {
            HttpFlavor::AntiBot => ScrapeMethod::AntiBot,
            HttpFlavor::Plain => ScrapeMethod::PlainHttp,
        }
    }
}

/// Static-markup transport. Cannot solve challenges; a challenge page is
/// reported as [`ScraperError::ChallengeBlocked`].
pub struct HttpTransport {
    flavor: HttpFlavor,
    client: Client,
    profile: Arc<ScrapeProfile>,
    limiter: Arc<RateLimiter>,
    identity: Arc<IdentityProvider>,
    delay: RequestDelay,
    timeout: Duration,
    curl_first: bool,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the client cannot be constructed.
    pub fn new(
        flavor: HttpFlavor,
        profile: Arc<ScrapeProfile>,
        limiter: Arc<RateLimiter>,
        identity: Arc<IdentityProvider>,
        delay: RequestDelay,
        timeout: Duration,
    ) -> Result<Self, ScraperError> {
        let builder = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT);
        let client = match flavor {
            HttpFlavor::AntiBot => builder
                .default_headers(browser_headers(&profile))
                .cookie_store(true)
                .gzip(true)
                .brotli(true)
                .build()?,
            HttpFlavor::Plain => builder.build()?,
        };
        Ok(Self {
            flavor,
            client,
            profile,
            limiter,
            identity,
            delay,
            timeout,
            curl_first: flavor == HttpFlavor::AntiBot,
        })
    }

    /// Enables or disables the curl attempt. Only the anti-bot flavor uses it.
    #[must_use]
    pub fn with_curl(mut self, enabled: bool) -> Self {
        self.curl_first = enabled && self.flavor == HttpFlavor::AntiBot;
        self
    }

    async fn fetch(&self, url: &str, user_agent: &str) -> Result<String, ScraperError> {
        if self.curl_first {
            if let Some(body) = self.fetch_with_curl(url, user_agent).await {
                return Ok(body);
            }
            tracing::debug!(url, "curl fetch unusable, falling back to client");
        }

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }

    /// Some anti-bot stacks block reqwest's fingerprint but admit curl.
    async fn fetch_with_curl(&self, url: &str, user_agent: &str) -> Option<String> {
        let output = self.curl_command(url, user_agent).output().await.ok()?;
        if !output.status.success() {
            return None;
        }
        let body = String::from_utf8_lossy(&output.stdout).to_string();
        (!body.trim().is_empty() && !looks_like_challenge(&body)).then_some(body)
    }

    /// The child is killed if the fetch future is dropped, so a caller's
    /// timeout around `scrape()` does not leave curl running.
    fn curl_command(&self, url: &str, user_agent: &str) -> tokio::process::Command {
        let mut command = tokio::process::Command::new("curl");
        command
            .kill_on_drop(true)
            .arg("-Lsf")
            .arg("--compressed")
            .arg("--proto")
            .arg("=https,http")
            .arg("--max-filesize")
            .arg(CURL_MAX_FILESIZE)
            .arg("--max-time")
            .arg(self.timeout.as_secs().max(1).to_string())
            .arg("--user-agent")
            .arg(user_agent);
        for (name, value) in &self.profile.identity.headers {
            command.arg("-H").arg(format!("{name}: {value}"));
        }
        command.arg(url);
        command
    }
}

fn browser_headers(profile: &ScrapeProfile) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in &profile.identity.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::debug!(header = %name, "skipping invalid header"),
        }
    }
    headers
}

#[async_trait]
impl Transport for HttpTransport {
    fn method(&self) -> ScrapeMethod {
        self.flavor.method()
    }

    async fn fetch_and_extract(&self, url: &str) -> Result<ScrapeData, ScraperError> {
        self.limiter.acquire().await;
        let pause = self.delay.sample();
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        let user_agent = self.identity.user_agent();
        tracing::debug!(url, method = %self.method(), "fetching");
        let body = self.fetch(url, &user_agent).await?;
        if looks_like_challenge(&body) {
            return Err(ScraperError::ChallengeBlocked {
                url: url.to_string(),
            });
        }

        let extraction = extract_static(&body, url, &self.profile)?;
        Ok(extraction.into_data(self.method()))
    }
}
