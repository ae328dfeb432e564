use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("bot challenge could not be resolved for {url}")]
    ChallengeBlocked { url: String },

    #[error("browser automation error: {0}")]
    Browser(String),

    #[error("browser unavailable: {0}")]
    BrowserUnavailable(String),

    #[error("no parseable content returned for {url}")]
    EmptyDocument { url: String },

    #[error("All scraping methods failed. Last error: {last_error}")]
    AllStrategiesFailed { last_error: String },
}
