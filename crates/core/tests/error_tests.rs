// ═══════════════════════════════════════════════════════════════════
// Error Tests — CoreError variants, Display formatting, From impls,
// AppConfig loading
// ═══════════════════════════════════════════════════════════════════

use std::collections::HashMap;
use std::time::Duration;

use portfolio_tracker_core::config::{load_api_key, AppConfig};
use portfolio_tracker_core::errors::{redact_query, CoreError};
use portfolio_tracker_core::providers::registry::PriceSourceKind;
use portfolio_tracker_core::services::price_service::DateAlignment;

// ── Display formatting ──────────────────────────────────────────────

mod display {
    use super::*;

    #[test]
    fn api_error() {
        let err = CoreError::Api {
            provider: "AlphaVantage".into(),
            message: "bad symbol".into(),
        };
        assert_eq!(err.to_string(), "API error (AlphaVantage): bad symbol");
    }

    #[test]
    fn rate_limited() {
        let err = CoreError::RateLimited {
            provider: "AlphaVantage".into(),
            message: "5 calls per minute".into(),
        };
        assert_eq!(err.to_string(), "Rate limited by AlphaVantage: 5 calls per minute");
    }

    #[test]
    fn no_data() {
        let err = CoreError::NoData { symbol: "VIV.PA".into() };
        assert_eq!(err.to_string(), "No data returned for VIV.PA");
    }

    #[test]
    fn missing_api_key() {
        let err = CoreError::MissingApiKey { provider: "alphavantage".into() };
        assert_eq!(err.to_string(), "Missing API key for alphavantage");
    }

    #[test]
    fn invalid_config() {
        let err = CoreError::InvalidConfig("bad".into());
        assert_eq!(err.to_string(), "Invalid configuration: bad");
    }

    #[test]
    fn storage_variants() {
        assert_eq!(
            CoreError::Serialization("x".into()).to_string(),
            "Serialization error: x"
        );
        assert_eq!(
            CoreError::Deserialization("x".into()).to_string(),
            "Deserialization error: x"
        );
        assert_eq!(CoreError::FileIO("x".into()).to_string(), "File I/O error: x");
    }
}

// ── From impls ──────────────────────────────────────────────────────

mod from_impls {
    use super::*;

    #[test]
    fn from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CoreError = io.into();
        assert!(matches!(err, CoreError::FileIO(ref m) if m.contains("gone")));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: CoreError = json_err.into();
        assert!(matches!(err, CoreError::Deserialization(_)));
    }

    #[test]
    fn question_mark_converts() {
        fn read_missing() -> Result<String, CoreError> {
            Ok(std::fs::read_to_string("/definitely/not/here/cache.json")?)
        }
        assert!(matches!(read_missing(), Err(CoreError::FileIO(_))));
    }
}

// ── Query redaction ─────────────────────────────────────────────────

mod redaction {
    use super::*;

    #[test]
    fn strips_query_string() {
        let msg = "error sending request for url (https://www.alphavantage.co/query?function=FX_DAILY&apikey=SECRET)";
        let redacted = redact_query(msg);
        assert!(!redacted.contains("SECRET"));
        assert!(redacted.starts_with("error sending request for url (https://www.alphavantage.co/query?"));
        assert!(redacted.ends_with("<query redacted>"));
    }

    #[test]
    fn leaves_plain_messages_alone() {
        assert_eq!(redact_query("connection refused"), "connection refused");
    }
}

// ── AppConfig ───────────────────────────────────────────────────────

mod app_config {
    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let mut map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        // keep the developer's own api.key out of the picture
        map.entry("PORTFOLIO_API_KEY_FILE".into())
            .or_insert_with(|| "/nonexistent/api.key".into());
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.cache_path, std::path::PathBuf::from("data/cache.json"));
        assert_eq!(config.price_source, PriceSourceKind::AlphaVantage);
        assert_eq!(config.api_key, None);
        assert_eq!(config.request_spacing, Duration::from_secs(3));
        assert_eq!(config.refresh_after, chrono::Duration::hours(24));
        assert_eq!(config.date_alignment, DateAlignment::Intersection);
        assert_eq!(config.response_dir, std::path::PathBuf::from("data"));
        assert!(!config.replay_responses);
    }

    #[test]
    fn response_dir_follows_cache_path() {
        let config =
            AppConfig::from_lookup(lookup(&[("PORTFOLIO_CACHE_PATH", "/tmp/x/cache.json")])).unwrap();
        assert_eq!(config.response_dir, std::path::PathBuf::from("/tmp/x"));

        let bare = AppConfig::from_lookup(lookup(&[("PORTFOLIO_CACHE_PATH", "cache.json")])).unwrap();
        assert_eq!(bare.response_dir, std::path::PathBuf::from("."));

        let explicit = AppConfig::from_lookup(lookup(&[
            ("PORTFOLIO_CACHE_PATH", "/tmp/x/cache.json"),
            ("PORTFOLIO_RESPONSE_DIR", "/srv/responses"),
        ]))
        .unwrap();
        assert_eq!(explicit.response_dir, std::path::PathBuf::from("/srv/responses"));
    }

    #[test]
    fn replay_flag() {
        for (value, expected) in [("1", true), ("yes", true), ("TRUE", true), ("0", false), ("false", false), ("Off", false)] {
            let config = AppConfig::from_lookup(lookup(&[("ALPHAVANTAGE_CACHE", value)])).unwrap();
            assert_eq!(config.replay_responses, expected, "ALPHAVANTAGE_CACHE={value}");
        }
    }

    #[test]
    fn reads_every_variable() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORTFOLIO_CACHE_PATH", "/tmp/vivendi.json"),
            ("PORTFOLIO_PRICE_SOURCE", "yahoo"),
            ("PORTFOLIO_REQUEST_SPACING_MS", "250"),
            ("PORTFOLIO_REFRESH_HOURS", "6"),
            ("PORTFOLIO_DATE_ALIGNMENT", "union"),
            ("ALPHAVANTAGE_API_KEY", "  demo  "),
        ]))
        .unwrap();

        assert_eq!(config.cache_path, std::path::PathBuf::from("/tmp/vivendi.json"));
        assert_eq!(config.price_source, PriceSourceKind::Yahoo);
        assert_eq!(config.request_spacing, Duration::from_millis(250));
        assert_eq!(config.refresh_after, chrono::Duration::hours(6));
        assert_eq!(config.date_alignment, DateAlignment::Union);
        assert_eq!(config.api_key.as_deref(), Some("demo"));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORTFOLIO_CACHE_PATH", "   "),
            ("PORTFOLIO_REFRESH_HOURS", ""),
        ]))
        .unwrap();
        assert_eq!(config.cache_path, std::path::PathBuf::from("data/cache.json"));
        assert_eq!(config.refresh_after, chrono::Duration::hours(24));
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let err = AppConfig::from_lookup(lookup(&[("PORTFOLIO_REQUEST_SPACING_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(ref m) if m.contains("PORTFOLIO_REQUEST_SPACING_MS")));
    }

    #[test]
    fn rejects_non_positive_refresh_period() {
        let err = AppConfig::from_lookup(lookup(&[("PORTFOLIO_REFRESH_HOURS", "0")])).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_unknown_source_and_alignment() {
        assert!(AppConfig::from_lookup(lookup(&[("PORTFOLIO_PRICE_SOURCE", "bloomberg")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("PORTFOLIO_DATE_ALIGNMENT", "sideways")])).is_err());
    }

    #[test]
    fn alphavantage_without_key_fails_credentials_check() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert!(matches!(
            config.check_credentials(),
            Err(CoreError::MissingApiKey { .. })
        ));
    }

    #[test]
    fn yahoo_needs_no_credentials() {
        let config = AppConfig::from_lookup(lookup(&[("PORTFOLIO_PRICE_SOURCE", "yahoo")])).unwrap();
        assert!(config.check_credentials().is_ok());
    }

    #[test]
    fn key_file_is_read_when_env_is_unset() {
        let dir = tempfile::TempDir::new().unwrap();
        let key_file = dir.path().join("api.key");
        std::fs::write(&key_file, "FILEKEY\nsecond line\n").unwrap();
        let path = key_file.to_string_lossy().into_owned();

        let config = AppConfig::from_lookup(lookup(&[("PORTFOLIO_API_KEY_FILE", path.as_str())])).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("FILEKEY"));
        assert!(config.check_credentials().is_ok());
    }
}

// ── API key loading ─────────────────────────────────────────────────

mod api_key {
    use super::*;

    #[test]
    fn environment_wins_over_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let key_file = dir.path().join("api.key");
        std::fs::write(&key_file, "FILEKEY\n").unwrap();

        assert_eq!(
            load_api_key(Some("ENVKEY".into()), &key_file).as_deref(),
            Some("ENVKEY")
        );
    }

    #[test]
    fn first_line_of_file_trimmed() {
        let dir = tempfile::TempDir::new().unwrap();
        let key_file = dir.path().join("api.key");
        std::fs::write(&key_file, "  FILEKEY \r\nignored\n").unwrap();

        assert_eq!(load_api_key(None, &key_file).as_deref(), Some("FILEKEY"));
    }

    #[test]
    fn blank_env_falls_through_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let key_file = dir.path().join("api.key");
        std::fs::write(&key_file, "FILEKEY").unwrap();

        assert_eq!(
            load_api_key(Some("   ".into()), &key_file).as_deref(),
            Some("FILEKEY")
        );
    }

    #[test]
    fn missing_or_empty_file_gives_none() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(load_api_key(None, &dir.path().join("absent.key")), None);

        let empty = dir.path().join("empty.key");
        std::fs::write(&empty, "\n").unwrap();
        assert_eq!(load_api_key(None, &empty), None);
    }
}
