use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::CoreError;
use crate::models::portfolio::CurrencyPair;
use crate::models::price::PricePoint;
use crate::storage::format;
use super::traits::StockSource;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER: &str = "Alpha Vantage";

/// Alpha Vantage API provider for stock prices and FX daily closes.
///
/// - **Free tier**: 25 requests/day (across ALL endpoints).
/// - **Requires**: API key (`ALPHAVANTAGE_API_KEY` or the key file).
/// - **Data**: compact daily series, i.e. the last 100 trading days.
///
/// Prices are returned in the instrument's native currency.
pub struct AlphaVantageSource {
    client: Client,
    api_key: String,
    base_url: String,
    archive: Option<ResponseArchive>,
}

impl AlphaVantageSource {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, BASE_URL)
    }

    /// Point the source at another host (mirrors, test servers).
    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key,
            base_url: base_url.into(),
            archive: None,
        }
    }

    /// Keep raw responses in `archive`, and replay them from there when it is replaying.
    pub fn with_archive(mut self, archive: ResponseArchive) -> Self {
        self.archive = Some(archive);
        self
    }
}

// ── Raw response archive ────────────────────────────────────────────

/// Raw Alpha Vantage payloads on disk, one `<query id>.json` per symbol
/// (`VIV.PA.json`) or currency pair (`EUR.AUD.json`).
///
/// Every response carrying a daily series is written here. In replay mode a
/// stored payload is served instead of calling the API; a missing or
/// unreadable file falls back to the network.
#[derive(Debug, Clone)]
pub struct ResponseArchive {
    dir: PathBuf,
    replay: bool,
}

impl ResponseArchive {
    pub fn new(dir: impl Into<PathBuf>, replay: bool) -> Self {
        Self {
            dir: dir.into(),
            replay,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_replaying(&self) -> bool {
        self.replay
    }

    pub fn path_for(&self, query_id: &str) -> PathBuf {
        self.dir.join(format!("{query_id}.json"))
    }

    /// The stored payload for `query_id`, when replaying and one exists.
    fn replay(&self, query_id: &str) -> Option<Value> {
        if !self.replay {
            return None;
        }
        let path = self.path_for(query_id);
        let bytes = std::fs::read(&path).ok()?;
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) if !map.is_empty() => Some(Value::Object(map)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "stored response unreadable");
                None
            }
        }
    }

    fn store(&self, query_id: &str, body: &Value) -> Result<(), CoreError> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(query_id), format::to_pretty_json(body)?)?;
        Ok(())
    }
}

// ── Alpha Vantage API response types ────────────────────────────────

/// Both `TIME_SERIES_DAILY` and `FX_DAILY` share this shape; only the series key differs.
/// Throttled or rejected requests come back as 200 with one of the message fields set.
#[derive(Deserialize)]
struct DailySeriesResponse {
    #[serde(rename = "Time Series (Daily)", alias = "Time Series FX (Daily)")]
    time_series: Option<HashMap<String, HashMap<String, String>>>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[async_trait]
impl StockSource for AlphaVantageSource {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn daily_closes(
        &self,
        symbol: &str,
        from: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let query = [
            ("function", "TIME_SERIES_DAILY"),
            ("symbol", symbol),
            ("outputsize", "compact"),
            ("datatype", "json"),
            ("apikey", self.api_key.as_str()),
        ];
        let resp = self.fetch(&query, symbol).await?;
        parse_daily_series(resp, symbol, from)
    }

    async fn daily_rates(
        &self,
        pair: &CurrencyPair,
        from: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let label = pair.column();
        let query = [
            ("function", "FX_DAILY"),
            ("from_symbol", pair.from.as_str()),
            ("to_symbol", pair.to.as_str()),
            ("outputsize", "compact"),
            ("datatype", "json"),
            ("apikey", self.api_key.as_str()),
        ];
        let resp = self.fetch(&query, &label).await?;
        parse_daily_series(resp, &label, from)
    }
}

impl AlphaVantageSource {
    async fn fetch(
        &self,
        query: &[(&str, &str)],
        label: &str,
    ) -> Result<DailySeriesResponse, CoreError> {
        if let Some(body) = self.archive.as_ref().and_then(|a| a.replay(label)) {
            tracing::info!(provider = PROVIDER, symbol = label, "using stored response");
            return decode_response(body, label);
        }

        tracing::debug!(provider = PROVIDER, symbol = label, "requesting daily series");
        let body: Value = self
            .client
            .get(&self.base_url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to parse daily series for {label}: {e}"),
            })?;

        let has_series = body
            .as_object()
            .is_some_and(|o| o.keys().any(|k| k.starts_with("Time Series")));
        if let Some(archive) = self.archive.as_ref().filter(|_| has_series) {
            if let Err(e) = archive.store(label, &body) {
                tracing::warn!(provider = PROVIDER, symbol = label, error = %e, "response not archived");
            }
        }
        decode_response(body, label)
    }
}

fn decode_response(body: Value, label: &str) -> Result<DailySeriesResponse, CoreError> {
    serde_json::from_value(body).map_err(|e| CoreError::Api {
        provider: PROVIDER.into(),
        message: format!("Failed to parse daily series for {label}: {e}"),
    })
}

fn parse_daily_series(
    resp: DailySeriesResponse,
    label: &str,
    from: NaiveDate,
) -> Result<Vec<PricePoint>, CoreError> {
    if let Some(msg) = resp.note.or(resp.information) {
        return Err(CoreError::RateLimited {
            provider: PROVIDER.into(),
            message: msg,
        });
    }
    if let Some(msg) = resp.error_message {
        return Err(CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("{label}: {msg}"),
        });
    }

    let series = resp.time_series.ok_or_else(|| CoreError::NoData {
        symbol: label.to_string(),
    })?;

    let mut points: Vec<PricePoint> = series
        .iter()
        .filter_map(|(date_str, fields)| {
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()?;
            if date < from {
                return None;
            }
            // Field names are numbered ("4. close"); match on the word only.
            let close = fields
                .iter()
                .find(|(k, _)| k.to_lowercase().contains("close"))
                .and_then(|(_, v)| v.trim().parse::<f64>().ok())?;
            Some(PricePoint::new(date, close))
        })
        .collect();

    points.sort_by_key(|p| p.date);
    Ok(points)
}
