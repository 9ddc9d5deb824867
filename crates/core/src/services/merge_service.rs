use chrono::NaiveDate;
use std::sync::Arc;

use crate::models::portfolio::{CurrencyPair, PortfolioConfig, Weighting};
use crate::models::price::{RateDate, UNRESOLVED_RATE};
use crate::models::quote::round_to;
use crate::models::table::TimeSeriesTable;
use crate::providers::traits::RateSource;

/// Decimal places kept for derived valuation columns.
pub const VALUATION_PRECISION: i32 = 3;

/// Outcome of a merge: the combined table and what happened to its rate cells.
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    pub table: TimeSeriesTable,
    /// Rate cells resolved by the exchange-rate source during this merge.
    pub resolved_rates: usize,
    /// Rate cells still holding the sentinel; retried on the next merge.
    pub unresolved_rates: Vec<(String, NaiveDate)>,
}

/// Combines a cached table with freshly fetched data.
///
/// 1. Union the date index. Instrument cells: fresh wins where it has a value,
///    cached fills the rest. Rate cells: an already-resolved cached rate is
///    kept; otherwise a non-zero fresh rate is taken. Absent cells become `0`.
/// 2. Every rate cell still at the sentinel is looked up through the
///    `RateSource`. Failures leave the sentinel in place.
/// 3. Every derived column is recomputed from scratch over all rows.
///
/// Never fails; degraded cells are reported in `MergeReport`.
pub struct MergeEngine {
    config: PortfolioConfig,
    rates: Arc<dyn RateSource>,
}

impl MergeEngine {
    pub fn new(config: PortfolioConfig, rates: Arc<dyn RateSource>) -> Self {
        Self { config, rates }
    }

    pub async fn merge(&self, cached: &TimeSeriesTable, fresh: &TimeSeriesTable) -> MergeReport {
        let mut table = self.combine(cached, fresh);
        let (resolved_rates, unresolved_rates) = self.resolve_rates(&mut table).await;
        self.recompute_derived(&mut table);

        tracing::info!(
            rows = table.len(),
            resolved_rates,
            unresolved = unresolved_rates.len(),
            "merge finished"
        );
        MergeReport {
            table,
            resolved_rates,
            unresolved_rates,
        }
    }

    /// Step 1: cell-wise union of the two tables, derived columns dropped.
    pub fn combine(&self, cached: &TimeSeriesTable, fresh: &TimeSeriesTable) -> TimeSeriesTable {
        let mut table = cached.clone();
        for derived in &self.config.derived {
            table.remove_column(&derived.name);
        }

        for date in fresh.dates() {
            table.add_row(date);
        }

        for column in fresh.column_names() {
            if self.config.derived_column(&column).is_some() {
                continue;
            }
            let Some(cells) = fresh.column(&column) else {
                continue;
            };
            let is_rate = self.is_rate_column(&column);
            table.add_column(&column);

            for (date, value) in cells {
                if !value.is_finite() {
                    continue;
                }
                if is_rate {
                    let cached_rate = table.get(&column, *date).unwrap_or(UNRESOLVED_RATE);
                    if cached_rate == UNRESOLVED_RATE && *value != UNRESOLVED_RATE {
                        table.set(&column, *date, *value);
                    }
                } else {
                    table.set(&column, *date, *value);
                }
            }
        }

        for instrument in &self.config.instruments {
            table.add_column(&instrument.symbol);
        }
        for pair in self.config.rate_pairs() {
            table.add_column(&pair.column());
        }
        table.fill_missing(UNRESOLVED_RATE);
        table
    }

    /// Step 2: look up every unresolved rate cell of the configured pairs.
    pub async fn resolve_rates(
        &self,
        table: &mut TimeSeriesTable,
    ) -> (usize, Vec<(String, NaiveDate)>) {
        let mut resolved = 0;
        let mut unresolved = Vec::new();

        for pair in self.config.rate_pairs() {
            let column = pair.column();
            for date in table.dates() {
                let current = table.get(&column, date).unwrap_or(UNRESOLVED_RATE);
                if current != UNRESOLVED_RATE {
                    continue;
                }
                let outcome = self.rates.rate(&pair, RateDate::On(date)).await;
                if outcome.is_resolved() {
                    resolved += 1;
                } else {
                    tracing::warn!(%pair, %date, "rate left unresolved");
                    unresolved.push((column.clone(), date));
                }
                table.set(&column, date, outcome.value());
            }
        }

        (resolved, unresolved)
    }

    /// Step 3: rebuild every derived column from instrument and rate cells.
    pub fn recompute_derived(&self, table: &mut TimeSeriesTable) {
        for derived in &self.config.derived {
            table.remove_column(&derived.name);
            table.add_column(&derived.name);
            for date in table.dates() {
                let value = self.valuation_on(table, date, derived.weighting);
                table.set(&derived.name, date, value);
            }
        }
    }

    /// Σ price × scale × rate (× shares for holdings), rounded to the valuation precision.
    pub fn valuation_on(&self, table: &TimeSeriesTable, date: NaiveDate, weighting: Weighting) -> f64 {
        let total: f64 = self
            .config
            .instruments
            .iter()
            .map(|inst| {
                let price = table.get(&inst.symbol, date).unwrap_or(0.0);
                let rate = match self.config.rate_column_for(inst) {
                    Some(column) => table.get(&column, date).unwrap_or(UNRESOLVED_RATE),
                    None => 1.0,
                };
                let weight = match weighting {
                    Weighting::Unit => 1.0,
                    Weighting::Holdings => inst.shares,
                };
                price * inst.scale * rate * weight
            })
            .sum();
        round_to(total, VALUATION_PRECISION)
    }

    fn is_rate_column(&self, column: &str) -> bool {
        self.config.instrument(column).is_none() && CurrencyPair::parse(column).is_some()
    }
}
