use std::str::FromStr;

use crate::error::{AppError, Result};
use crate::types::{WindowKey, HOUR_MS};

pub const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";

pub const DEFAULT_PLATFORM_ID: &str = "polymarket";
pub const DEFAULT_PLATFORM_NAME: &str = "Polymarket";

/// Markets requested per Gamma page.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Hard cap on pages per run.
pub const DEFAULT_MAX_PAGES: usize = 20;

pub const DEFAULT_LOOKBACK_HOURS: i64 = 72;

/// The lookback must exceed the longest window by at least this much so the
/// "then" point is still inside the loaded range.
pub const LOOKBACK_SAFETY_MARGIN_MS: i64 = HOUR_MS;

/// Run timestamps are floored to this bucket so racing runs share snapshot keys.
pub const DEFAULT_SNAPSHOT_BUCKET_SECS: i64 = 60;

/// HTTP timeout for upstream requests (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub gamma_api_url: String,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    pub platform_id: String,
    pub platform_name: String,
    /// Rows per upstream page (PAGE_SIZE)
    pub page_size: usize,
    /// Maximum upstream pages per run (MAX_PAGES)
    pub max_pages: usize,
    /// Window keys computed each run (WINDOWS, comma-separated)
    pub windows: Vec<WindowKey>,
    /// How far back snapshots are loaded for move computation (LOOKBACK_HOURS)
    pub lookback_ms: i64,
    /// SNAPSHOT_BUCKET_SECS
    pub snapshot_bucket_ms: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::Config("DB_PATH is required".to_string()))?;

        let windows = match lookup("WINDOWS") {
            Some(raw) => parse_windows(&raw)?,
            None => WindowKey::ALL.to_vec(),
        };

        let lookback_hours: i64 = parse_var(&lookup, "LOOKBACK_HOURS", DEFAULT_LOOKBACK_HOURS)?;
        let lookback_ms = lookback_hours.saturating_mul(HOUR_MS);
        let longest = windows.iter().map(|w| w.duration_ms()).max().unwrap_or(0);
        if lookback_ms < longest + LOOKBACK_SAFETY_MARGIN_MS {
            return Err(AppError::Config(format!(
                "LOOKBACK_HOURS={lookback_hours} does not cover the longest window plus a 1h margin"
            )));
        }

        let page_size: usize = parse_var(&lookup, "PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        let max_pages: usize = parse_var(&lookup, "MAX_PAGES", DEFAULT_MAX_PAGES)?;
        let bucket_secs: i64 =
            parse_var(&lookup, "SNAPSHOT_BUCKET_SECS", DEFAULT_SNAPSHOT_BUCKET_SECS)?;
        if page_size == 0 || max_pages == 0 || bucket_secs <= 0 {
            return Err(AppError::Config(
                "PAGE_SIZE, MAX_PAGES and SNAPSHOT_BUCKET_SECS must be positive".to_string(),
            ));
        }

        Ok(Self {
            gamma_api_url: lookup("GAMMA_API_URL").unwrap_or_else(|| GAMMA_API_URL.to_string()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            db_path,
            api_port: parse_var(&lookup, "API_PORT", 3000u16)?,
            platform_id: lookup("PLATFORM_ID").unwrap_or_else(|| DEFAULT_PLATFORM_ID.to_string()),
            platform_name: lookup("PLATFORM_NAME")
                .unwrap_or_else(|| DEFAULT_PLATFORM_NAME.to_string()),
            page_size,
            max_pages,
            windows,
            lookback_ms,
            snapshot_bucket_ms: bucket_secs * 1_000,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: '{raw}'"))),
        None => Ok(default),
    }
}

fn parse_windows(raw: &str) -> Result<Vec<WindowKey>> {
    let mut windows = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let key = part.parse::<WindowKey>().map_err(AppError::Config)?;
        if !windows.contains(&key) {
            windows.push(key);
        }
    }
    if windows.is_empty() {
        return Err(AppError::Config("WINDOWS must name at least one window".to_string()));
    }
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_db_path_is_a_config_error() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn defaults_cover_all_windows() {
        let cfg = Config::from_lookup(lookup_from(&[("DB_PATH", "movers.db")])).unwrap();
        assert_eq!(cfg.windows, WindowKey::ALL.to_vec());
        assert_eq!(cfg.lookback_ms, 72 * HOUR_MS);
        assert_eq!(cfg.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(cfg.snapshot_bucket_ms, 60_000);
        assert_eq!(cfg.platform_id, "polymarket");
    }

    #[test]
    fn windows_are_parsed_and_deduplicated() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("DB_PATH", "movers.db"),
            ("WINDOWS", "5m, 1h,5m"),
        ]))
        .unwrap();
        assert_eq!(cfg.windows, vec![WindowKey::FiveMinutes, WindowKey::OneHour]);
    }

    #[test]
    fn unknown_window_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("DB_PATH", "x.db"), ("WINDOWS", "2d")]))
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn lookback_shorter_than_longest_window_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("DB_PATH", "x.db"),
            ("LOOKBACK_HOURS", "24"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let cfg = Config::from_lookup(lookup_from(&[
            ("DB_PATH", "x.db"),
            ("LOOKBACK_HOURS", "2"),
            ("WINDOWS", "1m,5m,1h"),
        ]))
        .unwrap();
        assert_eq!(cfg.lookback_ms, 2 * HOUR_MS);
    }

    #[test]
    fn malformed_number_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("DB_PATH", "x.db"), ("PAGE_SIZE", "lots")]))
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
