//! Bot-challenge detection and resolution as an explicit state machine.
//!
//! ```text
//! Unchallenged ──(challenge phrase seen)──▶ Detected ──▶ Resolving ──▶ Resolved
//!                                                            │
//!                                             ceiling hit, one reload
//!                                                            ▼
//!                                                         Blocked
//! ```

use std::time::Duration;

use revscrape_core::profile::{ChallengeVocabulary, TimingProfile};

use crate::error::ScraperError;
use crate::page::BrowserPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    Unchallenged,
    Detected,
    Resolving { waited: Duration },
    Resolved,
    Blocked,
}

/// Terminal success states of [`ChallengeResolver::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// No challenge was ever seen.
    Unchallenged,
    /// A challenge was seen and cleared.
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeReport {
    pub outcome: ChallengeOutcome,
    pub polls: u32,
    pub checkbox_clicked: bool,
    pub reloaded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeTiming {
    pub poll_interval: Duration,
    pub ceiling: Duration,
    pub click_settle: Duration,
    pub resolved_settle: Duration,
    pub reload_wait: Duration,
}

impl ChallengeTiming {
    #[must_use]
    pub fn from_profile(timing: &TimingProfile) -> Self {
        Self {
            poll_interval: TimingProfile::duration(timing.challenge_poll_interval_secs),
            ceiling: TimingProfile::duration(timing.challenge_ceiling_secs),
            click_settle: TimingProfile::duration(timing.challenge_click_settle_secs),
            resolved_settle: TimingProfile::duration(timing.challenge_resolved_settle_secs),
            reload_wait: TimingProfile::duration(timing.challenge_reload_wait_secs),
        }
    }
}

impl Default for ChallengeTiming {
    fn default() -> Self {
        Self::from_profile(&TimingProfile::default())
    }
}

/// What one inspection of the page found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Inspection {
    challenged: bool,
    success: bool,
}

impl Inspection {
    fn cleared(self) -> bool {
        !self.challenged || self.success
    }
}

#[derive(Debug, Clone)]
pub struct ChallengeResolver {
    challenge_phrases: Vec<String>,
    success_phrases: Vec<String>,
    checkbox_selector: String,
    timing: ChallengeTiming,
}

impl ChallengeResolver {
    #[must_use]
    pub fn new(vocabulary: &ChallengeVocabulary, timing: ChallengeTiming) -> Self {
        let lower = |phrases: &[String]| -> Vec<String> {
            phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect()
        };
        Self {
            challenge_phrases: lower(&vocabulary.challenge_phrases),
            success_phrases: lower(&vocabulary.success_phrases),
            checkbox_selector: vocabulary.checkbox_selector.clone(),
            timing,
        }
    }

    /// True when any challenge phrase occurs in the page text, title or URL.
    #[must_use]
    pub fn is_challenged(&self, text: &str, title: &str, url: &str) -> bool {
        let haystacks = [text.to_lowercase(), title.to_lowercase(), url.to_lowercase()];
        self.challenge_phrases
            .iter()
            .any(|phrase| haystacks.iter().any(|h| h.contains(phrase.as_str())))
    }

    fn has_success_marker(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.success_phrases
            .iter()
            .any(|phrase| lowered.contains(phrase.as_str()))
    }

    async fn inspect(&self, page: &dyn BrowserPage) -> Result<Inspection, ScraperError> {
        let text = page.content().await?;
        let title = page.title().await?.unwrap_or_default();
        let url = page.current_url().await?.unwrap_or_default();
        Ok(Inspection {
            challenged: self.is_challenged(&text, &title, &url),
            success: self.has_success_marker(&text),
        })
    }

    /// Drives the state machine to a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::ChallengeBlocked`] when the challenge survives
    /// the polling ceiling and one reload, or any error from `page`.
    pub async fn resolve(
        &self,
        page: &dyn BrowserPage,
        url: &str,
    ) -> Result<ChallengeReport, ScraperError> {
        let mut report = ChallengeReport {
            outcome: ChallengeOutcome::Unchallenged,
            polls: 0,
            checkbox_clicked: false,
            reloaded: false,
        };

        let mut state = if self.inspect(page).await?.challenged {
            ChallengeState::Detected
        } else {
            ChallengeState::Unchallenged
        };

        loop {
            state = match state {
                ChallengeState::Unchallenged => return Ok(report),

                ChallengeState::Detected => {
                    tracing::info!(url, "bot challenge detected; attempting to resolve");
                    match page.click_first(&self.checkbox_selector).await {
                        Ok(true) => {
                            report.checkbox_clicked = true;
                            tracing::info!(url, "clicked verification checkbox");
                            tokio::time::sleep(self.timing.click_settle).await;
                        }
                        Ok(false) => {}
                        Err(e) => tracing::debug!(url, error = %e, "checkbox click failed"),
                    }
                    ChallengeState::Resolving {
                        waited: Duration::ZERO,
                    }
                }

                ChallengeState::Resolving { waited } if waited >= self.timing.ceiling => {
                    tracing::warn!(
                        url,
                        waited_secs = waited.as_secs(),
                        "challenge still present at ceiling; reloading once"
                    );
                    page.reload().await?;
                    report.reloaded = true;
                    tokio::time::sleep(self.timing.reload_wait).await;
                    if self.inspect(page).await?.challenged {
                        ChallengeState::Blocked
                    } else {
                        ChallengeState::Resolved
                    }
                }

                ChallengeState::Resolving { waited } => {
                    tokio::time::sleep(self.timing.poll_interval).await;
                    report.polls += 1;
                    let inspection = self.inspect(page).await?;
                    if inspection.cleared() {
                        tokio::time::sleep(self.timing.resolved_settle).await;
                        ChallengeState::Resolved
                    } else {
                        tracing::debug!(url, polls = report.polls, "challenge still present");
                        let step = self.timing.poll_interval.max(Duration::from_millis(1));
                        ChallengeState::Resolving {
                            waited: waited + step,
                        }
                    }
                }

                ChallengeState::Resolved => {
                    tracing::info!(url, polls = report.polls, reloaded = report.reloaded, "challenge resolved");
                    report.outcome = ChallengeOutcome::Resolved;
                    return Ok(report);
                }

                ChallengeState::Blocked => {
                    tracing::warn!(url, "challenge unresolved after reload");
                    return Err(ScraperError::ChallengeBlocked {
                        url: url.to_string(),
                    });
                }
            };
        }
    }
}
