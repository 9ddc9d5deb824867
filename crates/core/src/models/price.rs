use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single price data point (date → price).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }
}

/// The value of a rate cell that has not been resolved yet.
pub const UNRESOLVED_RATE: f64 = 0.0;

/// Which day an exchange rate is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDate {
    Latest,
    On(NaiveDate),
}

impl RateDate {
    /// Path segment used by the currency-api endpoints.
    pub fn as_path(&self) -> String {
        match self {
            RateDate::Latest => "latest".to_string(),
            RateDate::On(date) => date.format("%Y-%m-%d").to_string(),
        }
    }
}

impl std::fmt::Display for RateDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_path())
    }
}

/// Result of an exchange-rate lookup.
///
/// Lookups never raise; a failed lookup carries the reason for every endpoint tried.
#[derive(Debug, Clone, PartialEq)]
pub enum RateOutcome {
    Resolved(f64),
    Failed { attempts: Vec<String> },
}

impl RateOutcome {
    /// The rate, or the unresolved sentinel when every endpoint failed.
    pub fn value(&self) -> f64 {
        match self {
            RateOutcome::Resolved(rate) => *rate,
            RateOutcome::Failed { .. } => UNRESOLVED_RATE,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, RateOutcome::Resolved(_))
    }
}
