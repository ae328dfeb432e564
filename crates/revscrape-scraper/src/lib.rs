pub mod browser;
pub mod challenge;
pub mod error;
pub mod extract;
pub mod identity;
pub mod orchestrator;
pub mod page;
pub mod rate_limit;
pub mod retry;
pub mod transport;

pub use challenge::{
    ChallengeOutcome, ChallengeReport, ChallengeResolver, ChallengeState, ChallengeTiming,
};
pub use error::ScraperError;
pub use extract::{extract_interactive, extract_static, Extraction};
pub use identity::IdentityProvider;
pub use orchestrator::ReviewScraper;
pub use page::BrowserPage;
pub use rate_limit::RateLimiter;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use browser::{BrowserSession, BrowserSettings};
pub use transport::{BrowserTransport, HttpFlavor, HttpTransport, RequestDelay, Transport};
