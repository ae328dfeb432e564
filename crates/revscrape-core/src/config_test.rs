use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

#[test]
fn empty_environment_yields_defaults() {
    let map: HashMap<&str, &str> = HashMap::new();
    let config = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(config, AppConfig::default());
}

#[test]
fn default_timings_match_documented_values() {
    let config = AppConfig::default();
    assert_eq!(config.rate_limit_calls, 30);
    assert!((config.rate_limit_window_secs - 60.0).abs() < f64::EPSILON);
    assert_eq!(config.max_retries, 2);
    assert!((config.retry_base_delay_secs - 5.0).abs() < f64::EPSILON);
    assert_eq!(config.request_timeout_secs, 30);
}

#[test]
fn overrides_are_applied() {
    let mut map = HashMap::new();
    map.insert("REVSCRAPE_LOG_LEVEL", "debug");
    map.insert("REVSCRAPE_RATE_LIMIT_CALLS", "3");
    map.insert("REVSCRAPE_RATE_LIMIT_WINDOW_SECS", "1.5");
    map.insert("REVSCRAPE_MAX_RETRIES", "0");
    map.insert("REVSCRAPE_HEADLESS", "false");
    map.insert("REVSCRAPE_PROFILE_PATH", "/etc/revscrape/profile.yaml");
    map.insert("REVSCRAPE_CHROME_PATH", "");

    let config = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.rate_limit_calls, 3);
    assert!((config.rate_limit_window_secs - 1.5).abs() < f64::EPSILON);
    assert_eq!(config.max_retries, 0);
    assert!(!config.headless);
    assert_eq!(
        config.profile_path,
        Some(PathBuf::from("/etc/revscrape/profile.yaml"))
    );
    assert_eq!(config.chrome_path, None, "blank path should be treated as unset");
}

#[test]
fn rejects_non_numeric_retry_count() {
    let mut map = HashMap::new();
    map.insert("REVSCRAPE_MAX_RETRIES", "lots");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "REVSCRAPE_MAX_RETRIES"),
        "expected InvalidEnvVar(REVSCRAPE_MAX_RETRIES), got: {result:?}"
    );
}

#[test]
fn rejects_inverted_delay_bounds() {
    let mut map = HashMap::new();
    map.insert("REVSCRAPE_REQUEST_DELAY_MIN_SECS", "5");
    map.insert("REVSCRAPE_REQUEST_DELAY_MAX_SECS", "1");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "REVSCRAPE_REQUEST_DELAY_MIN_SECS"),
        "got: {result:?}"
    );
}

#[test]
fn rejects_negative_durations() {
    let mut map = HashMap::new();
    map.insert("REVSCRAPE_RETRY_BASE_DELAY_SECS", "-1");
    let result = build_app_config(lookup_from_map(&map));
    assert!(matches!(result, Err(ConfigError::InvalidEnvVar { .. })));
}

#[test]
fn rejects_seconds_too_large_for_a_duration() {
    for var in [
        "REVSCRAPE_RATE_LIMIT_WINDOW_SECS",
        "REVSCRAPE_REQUEST_DELAY_MAX_SECS",
        "REVSCRAPE_RETRY_BASE_DELAY_SECS",
        "REVSCRAPE_RETRY_MAX_DELAY_SECS",
    ] {
        let mut map = HashMap::new();
        map.insert(var, "1e30");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { var: ref v, .. }) if v == var),
            "expected InvalidEnvVar({var}), got: {result:?}"
        );
    }
}

#[test]
fn seconds_saturates_instead_of_panicking() {
    let config = AppConfig {
        rate_limit_window_secs: 1e30,
        request_delay_min_secs: -2.0,
        request_delay_max_secs: f64::INFINITY,
        ..AppConfig::default()
    };
    assert_eq!(config.rate_limit_window(), Duration::MAX);
    assert_eq!(
        config.request_delay_bounds(),
        (Duration::ZERO, Duration::MAX)
    );
}

#[test]
fn rejects_zero_rate_limit_quota() {
    let mut map = HashMap::new();
    map.insert("REVSCRAPE_RATE_LIMIT_CALLS", "0");
    let result = build_app_config(lookup_from_map(&map));
    assert!(matches!(result, Err(ConfigError::InvalidEnvVar { .. })));
}

#[test]
fn rejects_unknown_boolean_spelling() {
    let mut map = HashMap::new();
    map.insert("REVSCRAPE_HEADLESS", "maybe");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "REVSCRAPE_HEADLESS")
    );
}

#[test]
fn parse_flag_accepts_common_spellings() {
    assert_eq!(parse_flag("TRUE"), Some(true));
    assert_eq!(parse_flag(" yes "), Some(true));
    assert_eq!(parse_flag("0"), Some(false));
    assert_eq!(parse_flag("off"), Some(false));
    assert_eq!(parse_flag("nope"), None);
}
