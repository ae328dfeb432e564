use std::path::PathBuf;
use std::time::Duration;

/// Process-level settings read from the environment.
///
/// Site-specific knowledge (selectors, vocabularies, browser timings) lives in
/// [`crate::ScrapeProfile`]; this struct only carries the knobs an operator
/// tunes per deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub log_level: String,
    pub profile_path: Option<PathBuf>,
    pub store_path: PathBuf,
    pub request_timeout_secs: u64,
    pub request_delay_min_secs: f64,
    pub request_delay_max_secs: f64,
    pub rate_limit_calls: usize,
    pub rate_limit_window_secs: f64,
    pub max_retries: u32,
    pub retry_base_delay_secs: f64,
    pub retry_max_delay_secs: f64,
    pub retry_backoff_factor: f64,
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub randomize_user_agent: bool,
}

impl AppConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn rate_limit_window(&self) -> Duration {
        seconds(self.rate_limit_window_secs)
    }

    #[must_use]
    pub fn request_delay_bounds(&self) -> (Duration, Duration) {
        (
            seconds(self.request_delay_min_secs),
            seconds(self.request_delay_max_secs),
        )
    }
}

/// Converts fractional seconds to a `Duration` without panicking.
///
/// Negative and NaN inputs become zero; values too large for a `Duration`
/// saturate to `Duration::MAX`.
#[must_use]
pub fn seconds(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            profile_path: None,
            store_path: PathBuf::from("./data/scrapes.json"),
            request_timeout_secs: 30,
            request_delay_min_secs: 2.0,
            request_delay_max_secs: 4.0,
            rate_limit_calls: 30,
            rate_limit_window_secs: 60.0,
            max_retries: 2,
            retry_base_delay_secs: 5.0,
            retry_max_delay_secs: 60.0,
            retry_backoff_factor: 2.0,
            headless: true,
            chrome_path: None,
            randomize_user_agent: true,
        }
    }
}
