use serde::{Deserialize, Serialize};

use super::price::PricePoint;

/// Why a quote carries the figures it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteStatus {
    /// Current price and change computed from the last two rows.
    Ok,
    /// Fewer than two rows; figures default to zero.
    InsufficientHistory,
    /// Previous value is zero, so no change can be computed.
    ZeroPrevious,
    /// The symbol is not part of the table.
    UnknownSymbol,
}

/// Everything the presentation layer shows for one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesQuote {
    pub symbol: String,
    pub display_name: String,
    pub series: Vec<PricePoint>,
    /// Last value, rounded to 3 decimals.
    pub current_price: f64,
    /// Change from the previous row in percent, rounded to 2 decimals.
    pub percent_change: f64,
    pub status: QuoteStatus,
}

impl SeriesQuote {
    /// Build a quote from a series, never failing.
    pub fn from_series(
        symbol: impl Into<String>,
        display_name: impl Into<String>,
        series: Vec<PricePoint>,
    ) -> Self {
        let (current_price, percent_change, status) = match series.as_slice() {
            [.., prev, _] if prev.price == 0.0 => (0.0, 0.0, QuoteStatus::ZeroPrevious),
            [.., prev, curr] => (
                round_to(curr.price, 3),
                round_to((curr.price - prev.price) / prev.price * 100.0, 2),
                QuoteStatus::Ok,
            ),
            _ => (0.0, 0.0, QuoteStatus::InsufficientHistory),
        };

        Self {
            symbol: symbol.into(),
            display_name: display_name.into(),
            series,
            current_price,
            percent_change,
            status,
        }
    }

    /// Quote for a symbol the table does not know.
    pub fn unknown(symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        Self {
            display_name: symbol.clone(),
            symbol,
            series: Vec::new(),
            current_price: 0.0,
            percent_change: 0.0,
            status: QuoteStatus::UnknownSymbol,
        }
    }

    /// Percent change formatted the way the dashboard shows it ("+5.25%").
    pub fn change_label(&self) -> String {
        if self.percent_change > 0.0 {
            format!("+{}%", self.percent_change)
        } else {
            format!("{}%", self.percent_change)
        }
    }
}

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
