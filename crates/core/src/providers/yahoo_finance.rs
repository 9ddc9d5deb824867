use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use time::OffsetDateTime;

use crate::errors::CoreError;
use crate::models::portfolio::CurrencyPair;
use crate::models::price::PricePoint;
use super::traits::StockSource;

const PROVIDER: &str = "Yahoo Finance";

/// Yahoo Finance provider for stock prices and FX daily closes.
///
/// - **Free**: No API key required.
/// - **Coverage**: Global equities (exchange-suffixed tickers such as
///   `VIV.PA`, `CAN.L`) and currency crosses (`EURAUD=X`).
///
/// Uses the `yahoo_finance_api` crate. Prices are in the instrument's
/// native currency; London listings are quoted in pence.
pub struct YahooFinanceSource {
    connector: yahoo_finance_api::YahooConnector,
}

impl YahooFinanceSource {
    pub fn new() -> Result<Self, CoreError> {
        let connector = yahoo_finance_api::YahooConnector::new().map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to create connector: {e}"),
        })?;
        Ok(Self { connector })
    }

    /// Yahoo ticker for a currency cross, e.g. `EURAUD=X`.
    pub fn fx_ticker(pair: &CurrencyPair) -> String {
        format!("{}{}=X", pair.from, pair.to)
    }

    /// Midnight UTC of `date` as the `time` crate expects it.
    fn to_offset_datetime(date: NaiveDate) -> Result<OffsetDateTime, CoreError> {
        let invalid = |e: String| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Invalid date {date}: {e}"),
        };
        let month = time::Month::try_from(date.month() as u8).map_err(|e| invalid(e.to_string()))?;
        let day = time::Date::from_calendar_date(date.year(), month, date.day() as u8)
            .map_err(|e| invalid(e.to_string()))?;
        Ok(day.midnight().assume_utc())
    }

    async fn history(&self, ticker: &str, from: NaiveDate) -> Result<Vec<PricePoint>, CoreError> {
        let start = Self::to_offset_datetime(from)?;
        let tomorrow = chrono::Utc::now().date_naive() + chrono::Duration::days(1);
        let end = Self::to_offset_datetime(tomorrow)?;

        tracing::debug!(provider = PROVIDER, symbol = ticker, %from, "requesting quote history");
        let resp = self
            .connector
            .get_quote_history(ticker, start, end)
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to fetch history for {ticker}: {e}"),
            })?;

        let quotes = resp.quotes().map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to parse quotes for {ticker}: {e}"),
        })?;

        let mut points: Vec<PricePoint> = quotes
            .iter()
            .filter_map(|q| {
                let date = chrono::DateTime::from_timestamp(q.timestamp, 0)?.date_naive();
                (date >= from && q.close.is_finite()).then(|| PricePoint::new(date, q.close))
            })
            .collect();

        if points.is_empty() {
            return Err(CoreError::NoData {
                symbol: ticker.to_string(),
            });
        }

        points.sort_by_key(|p| p.date);
        // Intraday bars for the current session can share a date with the daily bar.
        points.dedup_by_key(|p| p.date);
        Ok(points)
    }
}

#[async_trait]
impl StockSource for YahooFinanceSource {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn daily_closes(
        &self,
        symbol: &str,
        from: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        self.history(symbol, from).await
    }

    async fn daily_rates(
        &self,
        pair: &CurrencyPair,
        from: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        self.history(&Self::fx_ticker(pair), from).await
    }
}
