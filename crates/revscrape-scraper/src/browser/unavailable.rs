use std::time::Duration;

use super::BrowserSettings;
use crate::error::ScraperError;
use crate::page::BrowserPage;

const NOT_COMPILED: &str = "browser support not compiled; rebuild with --features browser";

/// Stand-in used when the crate is built without the `browser` feature.
/// It has no values: `launch` always fails.
pub enum BrowserSession {}

impl BrowserSession {
    /// # Errors
    ///
    /// Always returns [`ScraperError::BrowserUnavailable`].
    pub async fn launch(_settings: &BrowserSettings) -> Result<Self, ScraperError> {
        Err(ScraperError::BrowserUnavailable(NOT_COMPILED.to_string()))
    }

    #[must_use]
    pub fn page(&self) -> &dyn BrowserPage {
        match *self {}
    }

    /// # Errors
    ///
    /// Never returns; no session exists to call this on.
    pub async fn set_user_agent(&self, _user_agent: &str) -> Result<(), ScraperError> {
        match *self {}
    }

    /// # Errors
    ///
    /// Never returns; no session exists to call this on.
    pub async fn navigate(&self, _url: &str, _timeout: Duration) -> Result<(), ScraperError> {
        match *self {}
    }

    pub async fn close(self) {
        match self {}
    }
}
