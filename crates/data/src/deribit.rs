//! Deribit public market-data client.
//!
//! Listing comes from `public/get_instruments`; quotes for each listed
//! contract come from `public/get_book_summary_by_instrument`. Every call is
//! paced by a shared rate limiter. Deribit quotes `mark_iv` in percent, so it
//! is divided by 100 on the way in.

use crate::error::{DataError, Result as DataResult};
use crate::expiry::{normalize_expiries, select_nearest};
use crate::provider::MarketDataProvider;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use smirk_trade_core::{DataConfig, Greeks, OptionContract, OptionKind, OptionsChainSnapshot};
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Production REST endpoint.
pub const DERIBIT_API_URL: &str = "https://www.deribit.com/api/v2";

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A listed option as returned by `public/get_instruments`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeribitInstrument {
    pub instrument_name: String,
    /// Expiry in epoch milliseconds.
    pub expiration_timestamp: i64,
    pub strike: f64,
    pub option_type: String,
}

/// Book summary for one instrument. The venue omits fields it has no quote for.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BookSummary {
    #[serde(default)]
    pub underlying_price: Option<f64>,
    #[serde(default)]
    pub underlying_index_price: Option<f64>,
    /// Mark implied volatility in percent.
    #[serde(default)]
    pub mark_iv: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub open_interest: Option<f64>,
    #[serde(default)]
    pub delta: Option<f64>,
    #[serde(default)]
    pub gamma: Option<f64>,
    #[serde(default)]
    pub theta: Option<f64>,
    #[serde(default)]
    pub vega: Option<f64>,
    #[serde(default)]
    pub last_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

pub struct DeribitClient {
    http: Client,
    base_url: String,
    rate_limiter: Arc<DirectLimiter>,
}

impl DeribitClient {
    /// Builds a client from the data section of the app config.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &DataConfig) -> DataResult<Self> {
        let per_second = NonZeroU32::new(config.rate_limit_per_sec).unwrap_or(nonzero!(10u32));
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        })
    }

    /// Sets a custom base URL (useful for testing).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lists live instruments of `kind` for a currency.
    ///
    /// # Errors
    /// Returns an error on transport failure, a venue error, or a non-list result.
    pub async fn get_instruments(
        &self,
        currency: &str,
        kind: &str,
    ) -> DataResult<Vec<DeribitInstrument>> {
        self.get_list(
            "public/get_instruments",
            &[("currency", currency), ("kind", kind), ("expired", "false")],
        )
        .await
    }

    /// Fetches the book summary rows for one instrument.
    ///
    /// # Errors
    /// Returns an error on transport failure, a venue error, or a non-list result.
    pub async fn get_book_summary(&self, instrument_name: &str) -> DataResult<Vec<BookSummary>> {
        self.get_list(
            "public/get_book_summary_by_instrument",
            &[("instrument_name", instrument_name)],
        )
        .await
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> DataResult<Vec<T>> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/{}", self.base_url, endpoint);
        tracing::debug!("GET {}", url);

        let response = self.http.get(&url).query(params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let envelope: RpcEnvelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(DataError::UnexpectedResponse(format!(
                    "{endpoint} returned HTTP {status}"
                )))
            }
        };
        if let Some(err) = envelope.error {
            return Err(DataError::api(err.code, err.message));
        }
        if !status.is_success() {
            return Err(DataError::UnexpectedResponse(format!(
                "{endpoint} returned HTTP {status}"
            )));
        }

        match envelope.result {
            Some(value @ serde_json::Value::Array(_)) => Ok(serde_json::from_value(value)?),
            _ => Err(DataError::UnexpectedResponse(format!(
                "{endpoint} result is not a list"
            ))),
        }
    }

    async fn build_snapshot(
        &self,
        currency: &str,
        expiry: DateTime<Utc>,
        instruments: &[DeribitInstrument],
    ) -> DataResult<Option<OptionsChainSnapshot>> {
        let mut ordered: Vec<&DeribitInstrument> = instruments.iter().collect();
        ordered.sort_by(|a, b| a.strike.total_cmp(&b.strike));

        let mut contracts = Vec::with_capacity(ordered.len());
        let mut spot: Option<f64> = None;
        let mut index_spot: Option<f64> = None;

        for instrument in ordered {
            let Some(kind) = OptionKind::parse(&instrument.option_type) else {
                tracing::warn!(
                    instrument = %instrument.instrument_name,
                    option_type = %instrument.option_type,
                    "Skipping instrument with unknown option type"
                );
                continue;
            };

            let summary = self
                .get_book_summary(&instrument.instrument_name)
                .await?
                .into_iter()
                .next()
                .unwrap_or_default();

            spot = spot.or(summary.underlying_price.filter(|p| *p > 0.0));
            index_spot = index_spot.or(summary.underlying_index_price.filter(|p| *p > 0.0));
            contracts.push(to_contract(instrument.strike, kind, &summary));
        }

        let Some(spot_price) = spot.or(index_spot) else {
            tracing::warn!(
                currency,
                expiry = %expiry.format("%Y-%m-%d"),
                "No underlying price quoted; dropping expiry"
            );
            return Ok(None);
        };

        Ok(Some(OptionsChainSnapshot::new(
            currency, spot_price, expiry, contracts,
        )))
    }
}

fn to_contract(strike: f64, kind: OptionKind, summary: &BookSummary) -> OptionContract {
    OptionContract {
        strike,
        kind,
        implied_volatility: summary.mark_iv.map(|iv| iv / 100.0),
        open_interest: summary.open_interest,
        volume: summary.volume,
        greeks: Greeks {
            delta: summary.delta,
            gamma: summary.gamma,
            theta: summary.theta,
            vega: summary.vega,
        },
        last_price: summary.last_price,
    }
}

fn group_by_expiry(
    instruments: Vec<DeribitInstrument>,
) -> BTreeMap<DateTime<Utc>, Vec<DeribitInstrument>> {
    let mut grouped: BTreeMap<DateTime<Utc>, Vec<DeribitInstrument>> = BTreeMap::new();
    for instrument in instruments {
        match DateTime::from_timestamp_millis(instrument.expiration_timestamp) {
            Some(expiry) => grouped.entry(expiry).or_default().push(instrument),
            None => tracing::warn!(
                instrument = %instrument.instrument_name,
                "Skipping instrument with invalid expiration timestamp"
            ),
        }
    }
    grouped
}

#[async_trait]
impl MarketDataProvider for DeribitClient {
    fn name(&self) -> &str {
        "deribit"
    }

    async fn fetch_options_chain(
        &self,
        symbol: &str,
        expiries: &[String],
    ) -> Result<Vec<OptionsChainSnapshot>> {
        let currency = symbol.to_uppercase();
        let requested = normalize_expiries(expiries, Utc::now());
        if requested.is_empty() {
            tracing::warn!(currency = %currency, "No resolvable expiries requested");
            return Ok(Vec::new());
        }

        let grouped = group_by_expiry(self.get_instruments(&currency, "option").await?);

        let mut resolved: BTreeMap<DateTime<Utc>, &[DeribitInstrument]> = BTreeMap::new();
        for expiry in requested {
            match select_nearest(&grouped, expiry) {
                Some((listed, bucket)) => {
                    resolved.entry(listed).or_insert(bucket.as_slice());
                }
                None => tracing::warn!(
                    currency = %currency,
                    expiry = %expiry.format("%Y-%m-%d"),
                    "No Deribit instruments found for expiry"
                ),
            }
        }

        let mut snapshots = Vec::with_capacity(resolved.len());
        for (expiry, bucket) in resolved {
            if let Some(snapshot) = self.build_snapshot(&currency, expiry, bucket).await? {
                snapshots.push(snapshot);
            }
        }

        tracing::info!(
            currency = %currency,
            snapshots = snapshots.len(),
            "Fetched Deribit options chain"
        );
        Ok(snapshots)
    }
}
