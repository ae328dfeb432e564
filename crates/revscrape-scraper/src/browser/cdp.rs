use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;

use super::{discover_chrome, BrowserSettings};
use crate::error::ScraperError;
use crate::page::BrowserPage;

fn cdp_err(e: impl std::fmt::Display) -> ScraperError {
    ScraperError::Browser(e.to_string())
}

/// One Chrome process with a single reusable tab.
pub struct BrowserSession {
    browser: Browser,
    page: CdpPage,
    handler: JoinHandle<()>,
    /// Set when the stealth script could not be registered up front and
    /// must be evaluated after each navigation instead.
    stealth_after_load: Option<String>,
}

impl BrowserSession {
    /// Launches Chrome and opens a blank tab.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Browser`] if Chrome cannot be started.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self, ScraperError> {
        tracing::info!(headless = settings.headless, "launching browser");

        let mut builder = BrowserConfig::builder().viewport(Viewport {
            width: settings.viewport_width,
            height: settings.viewport_height,
            ..Viewport::default()
        });
        if let Some(path) = discover_chrome(settings.chrome_path.as_deref()) {
            builder = builder.chrome_executable(path);
        }
        // with_head means NOT headless.
        if !settings.headless {
            builder = builder.with_head();
        }
        for arg in &settings.launch_args {
            builder = builder.arg(arg.as_str());
        }
        let config = builder.build().map_err(ScraperError::Browser)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(cdp_err)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "browser handler event error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(cdp_err(e));
            }
        };

        let mut stealth_after_load = None;
        if !settings.stealth_script.trim().is_empty() {
            let params = AddScriptToEvaluateOnNewDocumentParams::new(settings.stealth_script.clone());
            if let Err(e) = page.execute(params).await {
                tracing::debug!(error = %e, "stealth pre-injection failed, evaluating after load");
                stealth_after_load = Some(settings.stealth_script.clone());
            }
        }

        Ok(Self {
            browser,
            page: CdpPage(page),
            handler,
            stealth_after_load,
        })
    }

    #[must_use]
    pub fn page(&self) -> &CdpPage {
        &self.page
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::Browser`] if the override is rejected.
    pub async fn set_user_agent(&self, user_agent: &str) -> Result<(), ScraperError> {
        self.page
            .0
            .execute(SetUserAgentOverrideParams::new(user_agent.to_string()))
            .await
            .map_err(cdp_err)?;
        Ok(())
    }

    /// Navigates the tab to `url` and waits for the load, up to `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Browser`] on navigation failure or timeout.
    pub async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), ScraperError> {
        tracing::info!(url, "navigating");
        tokio::time::timeout(timeout, self.page.0.goto(url))
            .await
            .map_err(|_| {
                ScraperError::Browser(format!(
                    "navigation timed out after {}s for {url}",
                    timeout.as_secs()
                ))
            })?
            .map_err(cdp_err)?;

        if let Some(script) = &self.stealth_after_load {
            if let Err(e) = self.page.0.evaluate(script.as_str()).await {
                tracing::debug!(error = %e, "stealth evaluation skipped");
            }
        }
        Ok(())
    }

    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!(error = %e, "browser close error");
        }
        if let Err(e) = self.browser.wait().await {
            tracing::debug!(error = %e, "browser wait error");
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// A chromiumoxide tab behind [`BrowserPage`].
#[derive(Clone)]
pub struct CdpPage(Page);

#[async_trait]
impl BrowserPage for CdpPage {
    async fn content(&self) -> Result<String, ScraperError> {
        self.0.content().await.map_err(cdp_err)
    }

    async fn title(&self) -> Result<Option<String>, ScraperError> {
        self.0.get_title().await.map_err(cdp_err)
    }

    async fn current_url(&self) -> Result<Option<String>, ScraperError> {
        self.0.url().await.map_err(cdp_err)
    }

    async fn evaluate(&self, script: &str) -> Result<Value, ScraperError> {
        let result = self.0.evaluate(script).await.map_err(cdp_err)?;
        Ok(result.into_value::<Value>().unwrap_or(Value::Null))
    }

    async fn click_first(&self, selector: &str) -> Result<bool, ScraperError> {
        let elements = match self.0.find_elements(selector).await {
            Ok(elements) => elements,
            Err(e) => {
                tracing::debug!(selector, error = %e, "no clickable match");
                return Ok(false);
            }
        };
        let Some(element) = elements.into_iter().next() else {
            return Ok(false);
        };
        element.click().await.map_err(cdp_err)?;
        Ok(true)
    }

    async fn reload(&self) -> Result<(), ScraperError> {
        self.0.reload().await.map_err(cdp_err)?;
        Ok(())
    }
}
