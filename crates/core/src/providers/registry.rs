use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::CoreError;

use super::alphavantage::{AlphaVantageSource, ResponseArchive};
use super::traits::StockSource;
use super::yahoo_finance::YahooFinanceSource;

/// Which market-data provider feeds the stock price client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PriceSourceKind {
    /// Alpha Vantage: needs an API key, also serves FX daily closes.
    #[default]
    AlphaVantage,
    /// Yahoo Finance: keyless.
    Yahoo,
}

impl PriceSourceKind {
    pub fn requires_api_key(&self) -> bool {
        matches!(self, PriceSourceKind::AlphaVantage)
    }
}

impl std::fmt::Display for PriceSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceSourceKind::AlphaVantage => write!(f, "alphavantage"),
            PriceSourceKind::Yahoo => write!(f, "yahoo"),
        }
    }
}

impl FromStr for PriceSourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "alphavantage" | "alpha_vantage" | "alpha-vantage" => Ok(PriceSourceKind::AlphaVantage),
            "yahoo" | "yahoo_finance" => Ok(PriceSourceKind::Yahoo),
            other => Err(CoreError::InvalidConfig(format!(
                "Unknown price source '{other}' (expected 'alphavantage' or 'yahoo')"
            ))),
        }
    }
}

/// Build the configured stock source.
///
/// A provider that mandates a key fails here, at startup, when none is given.
/// `archive` only applies to Alpha Vantage.
pub fn build_stock_source(
    kind: PriceSourceKind,
    api_key: Option<&str>,
    archive: Option<ResponseArchive>,
) -> Result<Box<dyn StockSource>, CoreError> {
    match kind {
        PriceSourceKind::AlphaVantage => {
            let key = api_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .ok_or_else(|| CoreError::MissingApiKey {
                    provider: "alphavantage".into(),
                })?;
            let source = AlphaVantageSource::new(key.to_string());
            Ok(Box::new(match archive {
                Some(archive) => source.with_archive(archive),
                None => source,
            }))
        }
        PriceSourceKind::Yahoo => Ok(Box::new(YahooFinanceSource::new()?)),
    }
}
