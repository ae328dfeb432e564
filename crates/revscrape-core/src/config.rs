use std::path::PathBuf;
use std::time::Duration;

use crate::app_config::AppConfig;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every setting has a default, so an empty environment yields
/// [`AppConfig::default`].
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let defaults = AppConfig::default();

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: u32| -> Result<u32, ConfigError> {
        lookup(var).map_or(Ok(default), |raw| {
            raw.trim().parse::<u32>().map_err(|e| invalid(var, e.to_string()))
        })
    };

    let parse_u64 = |var: &str, default: u64| -> Result<u64, ConfigError> {
        lookup(var).map_or(Ok(default), |raw| {
            raw.trim().parse::<u64>().map_err(|e| invalid(var, e.to_string()))
        })
    };

    let parse_usize = |var: &str, default: usize| -> Result<usize, ConfigError> {
        lookup(var).map_or(Ok(default), |raw| {
            raw.trim()
                .parse::<usize>()
                .map_err(|e| invalid(var, e.to_string()))
        })
    };

    let parse_secs = |var: &str, default: f64| -> Result<f64, ConfigError> {
        let Ok(raw) = lookup(var) else {
            return Ok(default);
        };
        let value = raw
            .trim()
            .parse::<f64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if !value.is_finite() || value < 0.0 {
            return Err(invalid(var, format!("must be a non-negative number, got {value}")));
        }
        Duration::try_from_secs_f64(value).map_err(|e| invalid(var, e.to_string()))?;
        Ok(value)
    };

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        lookup(var).map_or(Ok(default), |raw| parse_flag(&raw).ok_or_else(|| {
            invalid(var, format!("expected true/false, got {raw:?}"))
        }))
    };

    let log_level = lookup("REVSCRAPE_LOG_LEVEL").unwrap_or(defaults.log_level);
    let profile_path = lookup("REVSCRAPE_PROFILE_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);
    let store_path = lookup("REVSCRAPE_STORE_PATH").map_or(defaults.store_path, PathBuf::from);
    let chrome_path = lookup("REVSCRAPE_CHROME_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);

    let request_timeout_secs =
        parse_u64("REVSCRAPE_REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?;
    let request_delay_min_secs =
        parse_secs("REVSCRAPE_REQUEST_DELAY_MIN_SECS", defaults.request_delay_min_secs)?;
    let request_delay_max_secs =
        parse_secs("REVSCRAPE_REQUEST_DELAY_MAX_SECS", defaults.request_delay_max_secs)?;
    if request_delay_min_secs > request_delay_max_secs {
        return Err(invalid(
            "REVSCRAPE_REQUEST_DELAY_MIN_SECS",
            format!(
                "minimum delay {request_delay_min_secs} exceeds maximum {request_delay_max_secs}"
            ),
        ));
    }

    let rate_limit_calls = parse_usize("REVSCRAPE_RATE_LIMIT_CALLS", defaults.rate_limit_calls)?;
    if rate_limit_calls == 0 {
        return Err(invalid(
            "REVSCRAPE_RATE_LIMIT_CALLS",
            "must be at least 1".to_string(),
        ));
    }
    let rate_limit_window_secs =
        parse_secs("REVSCRAPE_RATE_LIMIT_WINDOW_SECS", defaults.rate_limit_window_secs)?;

    let max_retries = parse_u32("REVSCRAPE_MAX_RETRIES", defaults.max_retries)?;
    let retry_base_delay_secs =
        parse_secs("REVSCRAPE_RETRY_BASE_DELAY_SECS", defaults.retry_base_delay_secs)?;
    let retry_max_delay_secs =
        parse_secs("REVSCRAPE_RETRY_MAX_DELAY_SECS", defaults.retry_max_delay_secs)?;
    let retry_backoff_factor =
        parse_secs("REVSCRAPE_RETRY_BACKOFF_FACTOR", defaults.retry_backoff_factor)?;

    let headless = parse_bool("REVSCRAPE_HEADLESS", defaults.headless)?;
    let randomize_user_agent = parse_bool("REVSCRAPE_RANDOM_UA", defaults.randomize_user_agent)?;

    Ok(AppConfig {
        log_level,
        profile_path,
        store_path,
        request_timeout_secs,
        request_delay_min_secs,
        request_delay_max_secs,
        rate_limit_calls,
        rate_limit_window_secs,
        max_retries,
        retry_base_delay_secs,
        retry_max_delay_secs,
        retry_backoff_factor,
        headless,
        chrome_path,
        randomize_user_agent,
    })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
