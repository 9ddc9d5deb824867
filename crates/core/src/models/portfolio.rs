use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::CoreError;

/// A currency conversion pair, e.g. EUR → AUD.
///
/// Rendered as `"EUR.AUD"`, which is also the name of its rate column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub from: String,
    pub to: String,
}

impl CurrencyPair {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into().to_uppercase(),
            to: to.into().to_uppercase(),
        }
    }

    /// Column name used in the time series table.
    pub fn column(&self) -> String {
        format!("{}.{}", self.from, self.to)
    }

    /// Parse a `"FROM.TO"` column name back into a pair.
    pub fn parse(s: &str) -> Option<Self> {
        let (from, to) = s.split_once('.')?;
        if is_currency_code(from) && is_currency_code(to) {
            Some(Self::new(from, to))
        } else {
            None
        }
    }
}

impl std::fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.from, self.to)
    }
}

/// A tracked security.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    /// Ticker symbol as the market-data provider knows it (e.g. "VIV.PA").
    pub symbol: String,
    /// Human-readable name shown next to the series.
    pub name: String,
    /// Currency the closing price is quoted in.
    pub currency: String,
    /// Quote-unit adjustment, e.g. 0.01 for prices quoted in pence.
    pub scale: f64,
    /// Number of shares held; used by holdings-weighted derived columns.
    pub shares: f64,
}

impl Instrument {
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        currency: impl Into<String>,
        scale: f64,
        shares: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            currency: currency.into().to_uppercase(),
            scale,
            shares,
        }
    }
}

/// How a derived column weights each instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weighting {
    /// One unit of every instrument.
    Unit,
    /// Each instrument multiplied by its share count.
    Holdings,
}

/// A computed valuation column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedColumn {
    pub name: String,
    pub display_name: String,
    pub weighting: Weighting,
}

impl DerivedColumn {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>, weighting: Weighting) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            weighting,
        }
    }
}

/// Static description of the tracked portfolio. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioConfig {
    /// Currency every valuation is expressed in.
    pub base_currency: String,
    /// First trading day of interest; nothing earlier is fetched.
    pub start_date: NaiveDate,
    pub instruments: Vec<Instrument>,
    pub derived: Vec<DerivedColumn>,
}

impl PortfolioConfig {
    /// Build and validate a configuration.
    pub fn new(
        base_currency: impl Into<String>,
        start_date: NaiveDate,
        instruments: Vec<Instrument>,
        derived: Vec<DerivedColumn>,
    ) -> Result<Self, CoreError> {
        let config = Self {
            base_currency: base_currency.into().to_uppercase(),
            start_date,
            instruments,
            derived,
        };
        config.validate()?;
        Ok(config)
    }

    /// The Vivendi group holdings tracked in AUD.
    pub fn default_portfolio() -> Self {
        Self {
            base_currency: "AUD".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 12, 15).unwrap_or_default(),
            instruments: vec![
                Instrument::new("VIV.PA", "Vivendi SE", "EUR", 1.0, 1565.0),
                Instrument::new("HAVAS.AS", "Havas N.V", "EUR", 1.0, 911.0),
                Instrument::new("CAN.L", "Canal+ SA", "GBP", 0.01, 891.0),
                Instrument::new("ALHG.PA", "Louis Hachette Group S.A.", "EUR", 1.0, 922.0),
            ],
            derived: vec![
                DerivedColumn::new("AUD.VALUE", "Estimated value in AUD", Weighting::Unit),
                DerivedColumn::new("STOCK.VALUE", "Holdings value in AUD", Weighting::Holdings),
            ],
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !is_currency_code(&self.base_currency) {
            return Err(CoreError::InvalidConfig(format!(
                "Invalid base currency '{}': must be exactly 3 upper-case ASCII letters",
                self.base_currency
            )));
        }
        if self.instruments.is_empty() {
            return Err(CoreError::InvalidConfig("Portfolio has no instruments".into()));
        }

        let mut seen = HashSet::new();
        for inst in &self.instruments {
            if inst.symbol.trim().is_empty() {
                return Err(CoreError::InvalidConfig("Instrument symbol must not be empty".into()));
            }
            if !seen.insert(inst.symbol.as_str()) {
                return Err(CoreError::InvalidConfig(format!(
                    "Duplicate instrument symbol '{}'",
                    inst.symbol
                )));
            }
            if !is_currency_code(&inst.currency) {
                return Err(CoreError::InvalidConfig(format!(
                    "Invalid currency '{}' for {}: must be exactly 3 upper-case ASCII letters",
                    inst.currency, inst.symbol
                )));
            }
            if !inst.scale.is_finite() || inst.scale <= 0.0 {
                return Err(CoreError::InvalidConfig(format!(
                    "Scale for {} must be finite and positive, got {}",
                    inst.symbol, inst.scale
                )));
            }
            if !inst.shares.is_finite() || inst.shares < 0.0 {
                return Err(CoreError::InvalidConfig(format!(
                    "Share count for {} must be finite and non-negative, got {}",
                    inst.symbol, inst.shares
                )));
            }
        }

        let rate_columns: HashSet<String> = self.rate_pairs().iter().map(|p| p.column()).collect();
        for column in &self.derived {
            if seen.contains(column.name.as_str()) || rate_columns.contains(&column.name) {
                return Err(CoreError::InvalidConfig(format!(
                    "Derived column '{}' collides with an instrument or rate column",
                    column.name
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(CoreError::InvalidConfig(format!(
                    "Duplicate derived column '{}'",
                    column.name
                )));
            }
        }

        Ok(())
    }

    /// Currency pairs needed to convert every instrument into the base currency,
    /// sorted and deduplicated. Instruments already in the base currency need none.
    pub fn rate_pairs(&self) -> Vec<CurrencyPair> {
        let mut pairs: Vec<CurrencyPair> = self
            .instruments
            .iter()
            .filter(|i| i.currency != self.base_currency)
            .map(|i| CurrencyPair::new(&i.currency, &self.base_currency))
            .collect();
        pairs.sort();
        pairs.dedup();
        pairs
    }

    /// Rate column for an instrument, or `None` when no conversion is needed.
    pub fn rate_column_for(&self, instrument: &Instrument) -> Option<String> {
        if instrument.currency == self.base_currency {
            None
        } else {
            Some(CurrencyPair::new(&instrument.currency, &self.base_currency).column())
        }
    }

    pub fn instrument(&self, symbol: &str) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.symbol == symbol)
    }

    pub fn derived_column(&self, name: &str) -> Option<&DerivedColumn> {
        self.derived.iter().find(|d| d.name == name)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.instruments.iter().map(|i| i.symbol.clone()).collect()
    }
}

/// Three upper-case ASCII letters, the form rate columns are named in.
pub(crate) fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}
