use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::CoreError;
use crate::models::portfolio::CurrencyPair;
use crate::models::price::{PricePoint, RateDate, RateOutcome};

/// A remote market-data provider serving daily closes.
///
/// Implementations perform exactly one outbound request per call; spacing
/// between calls is enforced by the caller's `RequestGate`.
#[async_trait]
pub trait StockSource: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Daily closing prices for `symbol` from `from` onwards, in the
    /// instrument's native currency. Order is not guaranteed.
    async fn daily_closes(
        &self,
        symbol: &str,
        from: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError>;

    /// Daily closing rates for a currency pair from `from` onwards.
    async fn daily_rates(
        &self,
        pair: &CurrencyPair,
        from: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError>;
}

/// Resolves a single conversion rate for a day.
///
/// Never fails: a lookup that cannot be satisfied returns
/// `RateOutcome::Failed` with the reasons collected along the way.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn rate(&self, pair: &CurrencyPair, date: RateDate) -> RateOutcome;
}
