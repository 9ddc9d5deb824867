pub mod config;
pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

use config::AppConfig;
use errors::CoreError;
use models::{portfolio::PortfolioConfig, quote::SeriesQuote, table::TimeSeriesTable};
use providers::{
    alphavantage::ResponseArchive, currency_api::ExchangeRateClient, gate::RequestGate,
    registry::build_stock_source, traits::RateSource,
};
use services::{
    merge_service::{MergeEngine, MergeReport},
    price_service::StockPriceClient,
};
use storage::cache::{CacheStore, JsonFileCache};

/// When cached data is considered too old to serve without a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub max_age: chrono::Duration,
}

impl RefreshPolicy {
    pub fn new(max_age: chrono::Duration) -> Self {
        Self { max_age }
    }

    /// Stale when never refreshed or when the last refresh is at least `max_age` old.
    pub fn is_stale(&self, last_refresh: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_refresh {
            Some(at) => now - at >= self.max_age,
            None => true,
        }
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::new(chrono::Duration::hours(24))
    }
}

/// Main entry point for the Portfolio Tracker core library.
///
/// Owns the merged table and the refresh policy, and serves the series the
/// dashboard renders. Any data access first re-checks staleness and, when
/// stale, runs one full refresh cycle (fetch → merge → save) before answering.
#[must_use]
pub struct PortfolioValuator {
    config: PortfolioConfig,
    stock_client: StockPriceClient,
    merge_engine: MergeEngine,
    store: Box<dyn CacheStore>,
    policy: RefreshPolicy,
    table: TimeSeriesTable,
    last_refresh: Option<DateTime<Utc>>,
    refresh_count: usize,
}

impl std::fmt::Debug for PortfolioValuator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioValuator")
            .field("instruments", &self.config.instruments.len())
            .field("rows", &self.table.len())
            .field("last_refresh", &self.last_refresh)
            .field("refresh_count", &self.refresh_count)
            .finish()
    }
}

impl PortfolioValuator {
    /// Load the cache and bring it up to date.
    pub async fn new(
        config: PortfolioConfig,
        stock_client: StockPriceClient,
        rates: Arc<dyn RateSource>,
        store: Box<dyn CacheStore>,
        policy: RefreshPolicy,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let cached = store.load();
        let mut valuator = Self {
            merge_engine: MergeEngine::new(config.clone(), rates),
            config,
            stock_client,
            store,
            policy,
            table: cached.table,
            last_refresh: cached.saved_at,
            refresh_count: 0,
        };
        valuator.update().await;
        Ok(valuator)
    }

    /// Wire up the real providers and the JSON file cache from `app`.
    pub async fn from_app_config(
        app: &AppConfig,
        portfolio: PortfolioConfig,
    ) -> Result<Self, CoreError> {
        app.check_credentials()?;
        let gate = RequestGate::shared(app.request_spacing);
        let archive = ResponseArchive::new(&app.response_dir, app.replay_responses);
        let source = build_stock_source(app.price_source, app.api_key.as_deref(), Some(archive))?;
        let stock_client =
            StockPriceClient::new(source, gate.clone()).with_alignment(app.date_alignment);
        let rates: Arc<dyn RateSource> = Arc::new(ExchangeRateClient::new(gate));
        let store = Box::new(JsonFileCache::new(&app.cache_path));

        Self::new(
            portfolio,
            stock_client,
            rates,
            store,
            RefreshPolicy::new(app.refresh_after),
        )
        .await
    }

    // ── Refresh ─────────────────────────────────────────────────────

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.policy.is_stale(self.last_refresh, Utc::now())
    }

    /// Refresh if stale. Returns `true` when a cycle ran.
    pub async fn update(&mut self) -> bool {
        if !self.is_stale() {
            return false;
        }
        self.refresh().await;
        true
    }

    /// Run one refresh cycle regardless of staleness.
    ///
    /// The in-memory timestamp is taken at the start of the cycle, so within
    /// this process a cycle that fetches nothing still waits a full period
    /// before the next attempt. Such a cycle is not saved, so a restart retries.
    pub async fn refresh(&mut self) -> MergeReport {
        self.last_refresh = Some(Utc::now());
        self.refresh_count += 1;
        tracing::info!(
            source = self.stock_client.source_name(),
            cycle = self.refresh_count,
            "refresh started"
        );

        let fetch = self
            .stock_client
            .fetch(
                &self.config.symbols(),
                &self.config.rate_pairs(),
                self.config.start_date,
            )
            .await;
        let report = self.merge_engine.merge(&self.table, &fetch.table).await;
        self.table = report.table.clone();

        // The store's save time is the refresh timestamp across restarts;
        // a cycle that gained nothing leaves it untouched.
        if fetch.table.is_empty() && report.resolved_rates == 0 {
            tracing::warn!("refresh produced no new data, cache left as is");
        } else if let Err(e) = self.store.save(&self.table) {
            tracing::warn!(error = %e, "failed to persist merged table");
        }
        tracing::info!(
            first = ?self.table.first_date(),
            last = ?self.table.last_date(),
            rows = self.table.len(),
            failed_columns = fetch.failures.len(),
            unresolved_rates = report.unresolved_rates.len(),
            "refresh finished"
        );
        report
    }

    #[must_use]
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    /// Number of refresh cycles run by this valuator.
    #[must_use]
    pub fn refresh_count(&self) -> usize {
        self.refresh_count
    }

    // ── Presentation ────────────────────────────────────────────────

    /// Derived valuation columns first, then instruments, in configuration order.
    #[must_use]
    pub fn list_symbols(&self) -> Vec<String> {
        self.config
            .derived
            .iter()
            .map(|d| d.name.clone())
            .chain(self.config.instruments.iter().map(|i| i.symbol.clone()))
            .collect()
    }

    /// Display name for a series; unknown symbols echo back.
    #[must_use]
    pub fn display_name(&self, symbol: &str) -> String {
        if let Some(derived) = self.config.derived_column(symbol) {
            return derived.display_name.clone();
        }
        self.config
            .instrument(symbol)
            .map(|i| i.name.clone())
            .unwrap_or_else(|| symbol.to_string())
    }

    /// Series, current value and percent change for `symbol`, refreshing first if stale.
    pub async fn get_data(&mut self, symbol: &str) -> SeriesQuote {
        self.update().await;
        self.quote(symbol)
    }

    /// Same as `get_data` without the staleness check.
    #[must_use]
    pub fn quote(&self, symbol: &str) -> SeriesQuote {
        let known = self.config.derived_column(symbol).is_some()
            || self.config.instrument(symbol).is_some()
            || self.table.has_column(symbol);
        if !known {
            return SeriesQuote::unknown(symbol);
        }
        SeriesQuote::from_series(symbol, self.display_name(symbol), self.table.series(symbol))
    }

    /// One quote per listed symbol, refreshing first if stale.
    pub async fn summary(&mut self) -> Vec<SeriesQuote> {
        self.update().await;
        self.list_symbols().iter().map(|s| self.quote(s)).collect()
    }

    #[must_use]
    pub fn date_index(&self) -> Vec<NaiveDate> {
        self.table.dates()
    }

    #[must_use]
    pub fn table(&self) -> &TimeSeriesTable {
        &self.table
    }

    #[must_use]
    pub fn portfolio(&self) -> &PortfolioConfig {
        &self.config
    }
}
