//! Environment-based configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::errors::CoreError;
use crate::providers::registry::PriceSourceKind;
use crate::services::price_service::DateAlignment;

/// Runtime settings for one tracker process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Where the merged table is persisted.
    pub cache_path: PathBuf,
    /// Market-data provider for stock closes.
    pub price_source: PriceSourceKind,
    /// Alpha Vantage key, if one was found.
    pub api_key: Option<String>,
    /// Minimum spacing between any two outbound requests.
    pub request_spacing: Duration,
    /// Age after which the cached table is refreshed.
    pub refresh_after: chrono::Duration,
    /// How per-symbol fetches are combined into rows.
    pub date_alignment: DateAlignment,
    /// Where raw Alpha Vantage responses are kept.
    pub response_dir: PathBuf,
    /// Serve stored Alpha Vantage responses instead of calling the API.
    pub replay_responses: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from("data/cache.json"),
            price_source: PriceSourceKind::default(),
            api_key: None,
            request_spacing: Duration::from_secs(3),
            refresh_after: chrono::Duration::hours(24),
            date_alignment: DateAlignment::default(),
            response_dir: PathBuf::from("data"),
            replay_responses: false,
        }
    }
}

impl AppConfig {
    /// Load from the process environment (after reading `.env`, if present).
    pub fn from_env() -> Result<Self, CoreError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let price_source = match var("PORTFOLIO_PRICE_SOURCE") {
            Some(v) => v.parse()?,
            None => defaults.price_source,
        };
        let date_alignment = match var("PORTFOLIO_DATE_ALIGNMENT") {
            Some(v) => v.parse()?,
            None => defaults.date_alignment,
        };
        let spacing_ms: u64 = parse_var(&var, "PORTFOLIO_REQUEST_SPACING_MS", 3000)?;
        let refresh_hours: i64 = parse_var(&var, "PORTFOLIO_REFRESH_HOURS", 24)?;
        if refresh_hours <= 0 {
            return Err(CoreError::InvalidConfig(format!(
                "PORTFOLIO_REFRESH_HOURS must be positive, got {refresh_hours}"
            )));
        }

        let key_file = var("PORTFOLIO_API_KEY_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("api.key"));
        let api_key = load_api_key(var("ALPHAVANTAGE_API_KEY"), &key_file);

        let cache_path = var("PORTFOLIO_CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_path);
        // Responses live next to the cache unless told otherwise.
        let response_dir = var("PORTFOLIO_RESPONSE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| match cache_path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                _ => PathBuf::from("."),
            });
        let replay_responses = var("ALPHAVANTAGE_CACHE").is_some_and(|v| is_enabled(&v));

        Ok(Self {
            cache_path,
            price_source,
            api_key,
            request_spacing: Duration::from_millis(spacing_ms),
            refresh_after: chrono::Duration::hours(refresh_hours),
            date_alignment,
            response_dir,
            replay_responses,
        })
    }

    /// Fail fast when the chosen provider needs a key and none was found.
    pub fn check_credentials(&self) -> Result<(), CoreError> {
        if self.price_source.requires_api_key() && self.api_key.is_none() {
            return Err(CoreError::MissingApiKey {
                provider: self.price_source.to_string(),
            });
        }
        Ok(())
    }
}

/// The key from the environment, else the first line of `key_file`.
pub fn load_api_key(from_env: Option<String>, key_file: &Path) -> Option<String> {
    if let Some(key) = from_env.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()) {
        return Some(key);
    }
    match std::fs::read_to_string(key_file) {
        Ok(contents) => contents
            .lines()
            .next()
            .map(|line| line.trim().to_string())
            .filter(|k| !k.is_empty()),
        Err(e) => {
            tracing::debug!(path = %key_file.display(), error = %e, "no API key file");
            None
        }
    }
}

/// Any non-empty value turns a flag on, except the usual spellings of "off".
fn is_enabled(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

fn parse_var<T, F>(var: &F, name: &str, default: T) -> Result<T, CoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw.trim().parse().map_err(|e| {
            CoreError::InvalidConfig(format!("{name}: cannot parse '{raw}': {e}"))
        }),
        None => Ok(default),
    }
}
