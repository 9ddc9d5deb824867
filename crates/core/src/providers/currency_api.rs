use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::CoreError;
use crate::models::portfolio::CurrencyPair;
use crate::models::price::{RateDate, RateOutcome};
use super::gate::RequestGate;
use super::traits::RateSource;

/// Primary endpoint: the currency-api dataset served from the jsDelivr CDN.
pub const JSDELIVR_ENDPOINT: &str =
    "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@{date}/v1/currencies/{base}.json";

/// Fallback endpoint: the same dataset mirrored on Cloudflare Pages.
pub const PAGES_ENDPOINT: &str = "https://{date}.currency-api.pages.dev/v1/currencies/{base}.json";

/// Exchange-rate client for the free currency-api dataset.
///
/// - **Free**: No API key.
/// - **Coverage**: daily snapshots of ~200 currencies, addressable by date.
/// - **Shape**: `GET .../{base}.json` → `{ "date": "...", "<base>": { "<target>": rate, ... } }`
///   with currency codes in lower case.
///
/// Endpoints are tried in order and the first usable rate wins. Every attempt
/// passes through the shared `RequestGate`.
pub struct ExchangeRateClient {
    client: Client,
    gate: Arc<RequestGate>,
    endpoints: Vec<String>,
}

impl ExchangeRateClient {
    pub fn new(gate: Arc<RequestGate>) -> Self {
        Self::with_endpoints(
            gate,
            vec![JSDELIVR_ENDPOINT.to_string(), PAGES_ENDPOINT.to_string()],
        )
    }

    /// Use custom endpoint templates. `{date}` and `{base}` are substituted.
    pub fn with_endpoints(gate: Arc<RequestGate>, endpoints: Vec<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            gate,
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    fn endpoint_url(template: &str, base: &str, date: RateDate) -> String {
        template
            .replace("{date}", &date.as_path())
            .replace("{base}", base)
    }

    async fn try_endpoint(&self, url: &str, base: &str, target: &str) -> Result<f64, CoreError> {
        self.gate.acquire().await;
        tracing::debug!(endpoint = url, "requesting exchange rate");

        let body: Value = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: "currency-api".into(),
                message: format!("Failed to parse rates for {base}: {e}"),
            })?;

        let rate = body
            .get(base)
            .and_then(|rates| rates.get(target))
            .and_then(Value::as_f64)
            .ok_or_else(|| CoreError::Api {
                provider: "currency-api".into(),
                message: format!("No rate found for {base} → {target}"),
            })?;

        if !rate.is_finite() || rate <= 0.0 {
            return Err(CoreError::Api {
                provider: "currency-api".into(),
                message: format!("Invalid rate for {base} → {target}: {rate}"),
            });
        }
        Ok(rate)
    }
}

#[async_trait]
impl RateSource for ExchangeRateClient {
    async fn rate(&self, pair: &CurrencyPair, date: RateDate) -> RateOutcome {
        if pair.from == pair.to {
            return RateOutcome::Resolved(1.0);
        }

        let base = pair.from.to_lowercase();
        let target = pair.to.to_lowercase();
        let mut attempts = Vec::with_capacity(self.endpoints.len());

        for template in &self.endpoints {
            let url = Self::endpoint_url(template, &base, date);
            match self.try_endpoint(&url, &base, &target).await {
                Ok(rate) => return RateOutcome::Resolved(rate),
                Err(e) => {
                    tracing::debug!(endpoint = %url, error = %e, "exchange rate endpoint failed");
                    attempts.push(format!("{url}: {e}"));
                }
            }
        }

        tracing::warn!(%pair, %date, "exchange rate unresolved on every endpoint");
        RateOutcome::Failed { attempts }
    }
}
