//! Headless Chrome sessions over CDP.
//!
//! Built on chromiumoxide when the `browser` feature is enabled; without it,
//! [`BrowserSession::launch`] reports the browser as unavailable and the
//! orchestrator moves on to the HTTP strategies.

use std::path::{Path, PathBuf};

use revscrape_core::{AppConfig, ScrapeProfile};

#[cfg(feature = "browser")]
mod cdp;
#[cfg(not(feature = "browser"))]
mod unavailable;

#[cfg(feature = "browser")]
pub use cdp::{BrowserSession, CdpPage};
#[cfg(not(feature = "browser"))]
pub use unavailable::BrowserSession;

/// Common Chrome executable locations, checked before `PATH`.
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];
const CHROME_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Everything needed to launch a session.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserSettings {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub launch_args: Vec<String>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Injected before any page script runs. Empty disables injection.
    pub stealth_script: String,
}

impl BrowserSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig, profile: &ScrapeProfile) -> Self {
        Self {
            headless: config.headless,
            chrome_path: config.chrome_path.clone(),
            launch_args: profile.browser.launch_args.clone(),
            viewport_width: profile.browser.viewport_width,
            viewport_height: profile.browser.viewport_height,
            stealth_script: profile.browser.stealth_script.clone(),
        }
    }
}

/// Resolves the Chrome binary: an explicit path wins, then well-known
/// locations, then `which`. `None` leaves detection to the CDP client.
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) fn discover_chrome(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Some(found) = CHROME_PATHS.iter().map(Path::new).find(|p| p.exists()) {
        tracing::debug!(path = %found.display(), "found chrome");
        return Some(found.to_path_buf());
    }

    CHROME_COMMANDS.iter().find_map(|cmd| {
        let output = std::process::Command::new("which").arg(cmd).output().ok()?;
        if !output.status.success() {
            return None;
        }
        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!path.is_empty()).then(|| PathBuf::from(path))
    })
}
