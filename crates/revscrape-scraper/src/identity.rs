//! Randomised browser identity (user-agent) per attempt.

use rand::seq::IndexedRandom;
use rand::Rng;

/// Last-resort user agent when both the generator and the pool are unavailable.
pub const BROWSER_FALLBACK_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const CHROME_PLATFORMS: [&str; 3] = [
    "Windows NT 10.0; Win64; x64",
    "Macintosh; Intel Mac OS X 10_15_7",
    "X11; Linux x86_64",
];

/// Hands out a fresh user-agent string for every attempt.
///
/// When generation is enabled a plausible Chrome UA is synthesised with a
/// random platform and major version; otherwise one is drawn from the
/// configured pool.
#[derive(Debug, Clone)]
pub struct IdentityProvider {
    pool: Vec<String>,
    generate: bool,
}

impl IdentityProvider {
    #[must_use]
    pub fn new(pool: Vec<String>, generate: bool) -> Self {
        let pool = pool.into_iter().filter(|ua| !ua.trim().is_empty()).collect();
        Self { pool, generate }
    }

    #[must_use]
    pub fn user_agent(&self) -> String {
        let mut rng = rand::rng();
        if self.generate {
            if let Some(platform) = CHROME_PLATFORMS.choose(&mut rng) {
                let major: u32 = rng.random_range(118..=131);
                return format!(
                    "Mozilla/5.0 ({platform}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.0.0 Safari/537.36"
                );
            }
        }
        self.pool
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| BROWSER_FALLBACK_UA.to_string())
    }
}
