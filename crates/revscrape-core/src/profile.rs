//! Site profile: selector cascades, vocabularies, identity pool and timings.
//!
//! A profile describes *where* data lives on one site's pages. The engine in
//! `revscrape-scraper` reads it but never mutates it, so a single
//! `Arc<ScrapeProfile>` is shared by every transport of a scraper instance.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

const EMBEDDED_PROFILE: &str = include_str!("../../../config/profile.yaml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeProfile {
    /// Human-facing site name; page titles containing it are considered generic.
    pub site_name: String,
    /// Brand names recognised at the start of a product title.
    #[serde(default)]
    pub brand_tokens: Vec<String>,
    pub product: ProductSelectors,
    #[serde(default)]
    pub product_xpath: ProductXpaths,
    pub reviews: ReviewSelectors,
    pub challenge: ChallengeVocabulary,
    #[serde(default)]
    pub verified_phrases: Vec<String>,
    pub identity: IdentityProfile,
    #[serde(default)]
    pub browser: BrowserProfile,
    #[serde(default)]
    pub timing: TimingProfile,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductSelectors {
    pub title: Vec<String>,
    #[serde(default)]
    pub brand: Vec<String>,
    #[serde(default)]
    pub price: Vec<String>,
    #[serde(default)]
    pub rating: Vec<String>,
    #[serde(default)]
    pub review_count: Vec<String>,
    #[serde(default)]
    pub description: Vec<String>,
    #[serde(default)]
    pub structural_title: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductXpaths {
    #[serde(default)]
    pub title: Vec<String>,
    #[serde(default)]
    pub price: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewSelectors {
    #[serde(default)]
    pub reviews_tab: Vec<String>,
    #[serde(default)]
    pub reviews_tab_xpath: Vec<String>,
    #[serde(default)]
    pub container: Vec<String>,
    #[serde(default)]
    pub individual_reviews_container: Vec<String>,
    pub review_item: Vec<String>,
    #[serde(default)]
    pub reviewer_name: Vec<String>,
    #[serde(default)]
    pub rating: Vec<String>,
    #[serde(default)]
    pub title: Vec<String>,
    #[serde(default)]
    pub body: Vec<String>,
    #[serde(default)]
    pub date: Vec<String>,
    #[serde(default)]
    pub verified: Vec<String>,
    #[serde(default)]
    pub helpful: Vec<String>,
    /// Class-name fragments marking an aggregate summary block, not a review.
    #[serde(default)]
    pub summary_classes: Vec<String>,
    /// Text fragments marking an aggregate summary block, not a review.
    #[serde(default)]
    pub summary_phrases: Vec<String>,
    /// Text fragments that make a node a heuristic review candidate.
    #[serde(default)]
    pub signal_phrases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeVocabulary {
    pub checkbox_selector: String,
    pub challenge_phrases: Vec<String>,
    pub success_phrases: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityProfile {
    pub user_agents: Vec<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserProfile {
    pub viewport_width: u32,
    pub viewport_height: u32,
    #[serde(default)]
    pub launch_args: Vec<String>,
    #[serde(default)]
    pub stealth_script: String,
}

impl Default for BrowserProfile {
    fn default() -> Self {
        Self {
            viewport_width: 1920,
            viewport_height: 1080,
            launch_args: Vec::new(),
            stealth_script: String::new(),
        }
    }
}

/// Fixed waits used by the browser strategy, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingProfile {
    pub challenge_poll_interval_secs: f64,
    pub challenge_ceiling_secs: f64,
    pub challenge_click_settle_secs: f64,
    pub challenge_resolved_settle_secs: f64,
    pub challenge_reload_wait_secs: f64,
    pub page_load_timeout_secs: f64,
    pub dom_ready_wait_secs: f64,
    pub post_load_settle_secs: f64,
    pub review_tab_settle_secs: f64,
    pub reviews_container_wait_secs: f64,
}

impl Default for TimingProfile {
    fn default() -> Self {
        Self {
            challenge_poll_interval_secs: 5.0,
            challenge_ceiling_secs: 60.0,
            challenge_click_settle_secs: 5.0,
            challenge_resolved_settle_secs: 5.0,
            challenge_reload_wait_secs: 15.0,
            page_load_timeout_secs: 30.0,
            dom_ready_wait_secs: 20.0,
            post_load_settle_secs: 3.0,
            review_tab_settle_secs: 5.0,
            reviews_container_wait_secs: 10.0,
        }
    }
}

impl TimingProfile {
    /// Converts a seconds field to a `Duration`, clamping garbage to zero.
    #[must_use]
    pub fn duration(secs: f64) -> Duration {
        crate::app_config::seconds(secs)
    }

    fn fields(&self) -> [(&'static str, f64); 10] {
        [
            ("challenge_poll_interval_secs", self.challenge_poll_interval_secs),
            ("challenge_ceiling_secs", self.challenge_ceiling_secs),
            ("challenge_click_settle_secs", self.challenge_click_settle_secs),
            ("challenge_resolved_settle_secs", self.challenge_resolved_settle_secs),
            ("challenge_reload_wait_secs", self.challenge_reload_wait_secs),
            ("page_load_timeout_secs", self.page_load_timeout_secs),
            ("dom_ready_wait_secs", self.dom_ready_wait_secs),
            ("post_load_settle_secs", self.post_load_settle_secs),
            ("review_tab_settle_secs", self.review_tab_settle_secs),
            ("reviews_container_wait_secs", self.reviews_container_wait_secs),
        ]
    }
}

impl ScrapeProfile {
    /// The profile compiled into the binary from `config/profile.yaml`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the embedded YAML fails to parse or validate.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_yaml(EMBEDDED_PROFILE)
    }

    /// Parse and validate a profile from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ProfileParse` for malformed YAML and
    /// `ConfigError::ProfileValidation` when a required cascade is empty.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let profile: Self = serde_yaml::from_str(yaml)?;
        profile.validate()?;
        Ok(profile)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let required: [(&str, &[String]); 5] = [
            ("product.title", self.product.title.as_slice()),
            ("reviews.review_item", self.reviews.review_item.as_slice()),
            ("challenge.challenge_phrases", self.challenge.challenge_phrases.as_slice()),
            ("challenge.success_phrases", self.challenge.success_phrases.as_slice()),
            ("identity.user_agents", self.identity.user_agents.as_slice()),
        ];
        for (name, list) in required {
            if list.iter().all(|s| s.trim().is_empty()) {
                return Err(ConfigError::ProfileValidation(format!(
                    "{name} must contain at least one entry"
                )));
            }
        }
        for (name, secs) in self.timing.fields() {
            if secs < 0.0 || Duration::try_from_secs_f64(secs).is_err() {
                return Err(ConfigError::ProfileValidation(format!(
                    "timing.{name} must be a non-negative number of seconds, got {secs}"
                )));
            }
        }
        if self.site_name.trim().is_empty() {
            return Err(ConfigError::ProfileValidation(
                "site_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load a profile from `path`, or the embedded default when `path` is `None`.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_profile(path: Option<&Path>) -> Result<ScrapeProfile, ConfigError> {
    let Some(path) = path else {
        return ScrapeProfile::embedded();
    };
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ProfileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    ScrapeProfile::from_yaml(&content)
}
