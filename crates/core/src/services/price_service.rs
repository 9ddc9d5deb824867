use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::CoreError;
use crate::models::portfolio::CurrencyPair;
use crate::models::price::PricePoint;
use crate::models::table::TimeSeriesTable;
use crate::providers::gate::RequestGate;
use crate::providers::traits::StockSource;

/// How the dates of separately fetched columns are combined into rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DateAlignment {
    /// Keep only dates every fetched column has. The table stays rectangular,
    /// but one lagging symbol shrinks the whole fetch window.
    #[default]
    Intersection,
    /// Keep every date any column has; gaps stay absent and are filled by the merge.
    Union,
}

impl FromStr for DateAlignment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "intersection" => Ok(DateAlignment::Intersection),
            "union" => Ok(DateAlignment::Union),
            other => Err(CoreError::InvalidConfig(format!(
                "Unknown date alignment '{other}' (expected 'intersection' or 'union')"
            ))),
        }
    }
}

/// A symbol or currency pair that could not be fetched this cycle.
#[derive(Debug)]
pub struct FetchFailure {
    pub column: String,
    pub error: CoreError,
}

/// Partial result of a fetch: the columns that succeeded plus the reasons for the ones that didn't.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub table: TimeSeriesTable,
    pub failures: Vec<FetchFailure>,
}

impl FetchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_columns(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.column.as_str()).collect()
    }
}

/// Fetches daily closes for a set of symbols (and optionally FX pairs) into one table.
///
/// One outbound call per column, each through the shared `RequestGate`.
/// A failing column is left out of the table and reported; it never fails the
/// whole fetch.
pub struct StockPriceClient {
    source: Box<dyn StockSource>,
    gate: Arc<RequestGate>,
    alignment: DateAlignment,
}

impl StockPriceClient {
    pub fn new(source: Box<dyn StockSource>, gate: Arc<RequestGate>) -> Self {
        Self {
            source,
            gate,
            alignment: DateAlignment::default(),
        }
    }

    pub fn with_alignment(mut self, alignment: DateAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn alignment(&self) -> DateAlignment {
        self.alignment
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Fetch closes for `symbols` and rates for `pairs` from `start` onwards.
    pub async fn fetch(
        &self,
        symbols: &[String],
        pairs: &[CurrencyPair],
        start: NaiveDate,
    ) -> FetchReport {
        let mut fetched: Vec<(String, Vec<PricePoint>)> = Vec::new();
        let mut failures = Vec::new();

        for symbol in symbols {
            self.gate.acquire().await;
            let result = self.source.daily_closes(symbol, start).await;
            collect(symbol.clone(), result, start, &mut fetched, &mut failures);
        }

        for pair in pairs {
            self.gate.acquire().await;
            let result = self.source.daily_rates(pair, start).await;
            collect(pair.column(), result, start, &mut fetched, &mut failures);
        }

        for failure in &failures {
            tracing::warn!(
                provider = self.source.name(),
                symbol = %failure.column,
                error = %failure.error,
                "column omitted from fetch"
            );
        }

        let table = align(fetched, self.alignment);
        tracing::info!(
            provider = self.source.name(),
            rows = table.len(),
            failed = failures.len(),
            "fetch finished"
        );
        FetchReport { table, failures }
    }
}

fn collect(
    column: String,
    result: Result<Vec<PricePoint>, CoreError>,
    start: NaiveDate,
    fetched: &mut Vec<(String, Vec<PricePoint>)>,
    failures: &mut Vec<FetchFailure>,
) {
    match result {
        Ok(points) => {
            let points: Vec<PricePoint> = points
                .into_iter()
                .filter(|p| p.date >= start && p.price.is_finite() && p.price >= 0.0)
                .collect();
            if points.is_empty() {
                failures.push(FetchFailure {
                    error: CoreError::NoData {
                        symbol: column.clone(),
                    },
                    column,
                });
            } else {
                fetched.push((column, points));
            }
        }
        Err(error) => failures.push(FetchFailure { column, error }),
    }
}

/// Combine per-column points into a table according to `alignment`.
pub fn align(columns: Vec<(String, Vec<PricePoint>)>, alignment: DateAlignment) -> TimeSeriesTable {
    let mut table = TimeSeriesTable::new();
    if columns.is_empty() {
        return table;
    }

    let keep: BTreeSet<NaiveDate> = match alignment {
        DateAlignment::Intersection => {
            let mut sets = columns
                .iter()
                .map(|(_, points)| points.iter().map(|p| p.date).collect::<BTreeSet<_>>());
            let first = sets.next().unwrap_or_default();
            sets.fold(first, |acc, set| acc.intersection(&set).copied().collect())
        }
        DateAlignment::Union => columns
            .iter()
            .flat_map(|(_, points)| points.iter().map(|p| p.date))
            .collect(),
    };

    for (column, points) in &columns {
        table.add_column(column);
        for point in points.iter().filter(|p| keep.contains(&p.date)) {
            table.set(column, point.date, point.price);
        }
    }
    table
}
