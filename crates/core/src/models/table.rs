use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use super::price::PricePoint;

/// A dated table: one row per trading day, one named column per series.
///
/// Rows are kept in a sorted set so the date index is always ascending and
/// unique. Cells are stored per column; a date missing from a column is an
/// absent cell, distinct from a stored zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeriesTable {
    index: BTreeSet<NaiveDate>,
    columns: BTreeMap<String, BTreeMap<NaiveDate, f64>>,
}

impl TimeSeriesTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Ascending row dates.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.index.iter().copied().collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.index.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.index.last().copied()
    }

    /// Column names in sorted order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Add a row with no cells. Existing rows are left untouched.
    pub fn add_row(&mut self, date: NaiveDate) {
        self.index.insert(date);
    }

    /// Add an empty column if it does not exist yet.
    pub fn add_column(&mut self, name: &str) {
        self.columns.entry(name.to_string()).or_default();
    }

    pub fn get(&self, column: &str, date: NaiveDate) -> Option<f64> {
        self.columns.get(column)?.get(&date).copied()
    }

    /// Set a cell, creating the row and column as needed.
    pub fn set(&mut self, column: &str, date: NaiveDate, value: f64) {
        self.index.insert(date);
        self.columns
            .entry(column.to_string())
            .or_default()
            .insert(date, value);
    }

    pub fn remove_column(&mut self, name: &str) -> bool {
        self.columns.remove(name).is_some()
    }

    /// Raw cells of a column keyed by date.
    pub fn column(&self, name: &str) -> Option<&BTreeMap<NaiveDate, f64>> {
        self.columns.get(name)
    }

    /// The column as points over the date index. Absent cells are skipped.
    pub fn series(&self, name: &str) -> Vec<PricePoint> {
        self.columns
            .get(name)
            .map(|cells| {
                self.index
                    .iter()
                    .filter_map(|d| cells.get(d).map(|v| PricePoint::new(*d, *v)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fill every absent cell of every column with `value`.
    pub fn fill_missing(&mut self, value: f64) {
        for cells in self.columns.values_mut() {
            for date in &self.index {
                cells.entry(*date).or_insert(value);
            }
        }
    }
}
