//! Market-data provider seam and the fixture-backed implementation.

use crate::expiry::{normalize_expiries, select_nearest};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use smirk_trade_core::OptionsChainSnapshot;
use std::collections::BTreeMap;
use std::path::Path;

/// Source of options-chain snapshots for one underlying.
///
/// Implementations return at most one snapshot per resolved expiry, sorted
/// by expiry. Requested expiries that cannot be resolved are dropped with a
/// warning rather than failing the whole fetch.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Short identifier used in cache keys and logs.
    fn name(&self) -> &str;

    /// Fetches snapshots for `symbol` at the requested expiries.
    ///
    /// # Errors
    /// Returns an error when the upstream source is unreachable or answers
    /// with a malformed payload.
    async fn fetch_options_chain(
        &self,
        symbol: &str,
        expiries: &[String],
    ) -> Result<Vec<OptionsChainSnapshot>>;
}

/// Serves snapshots loaded up front, e.g. from a JSON fixture.
///
/// Each requested expiry resolves to the closest stored snapshot for the
/// symbol. An empty request returns every stored snapshot for the symbol.
#[derive(Debug, Clone, Default)]
pub struct StaticChainProvider {
    snapshots: Vec<OptionsChainSnapshot>,
}

impl StaticChainProvider {
    #[must_use]
    pub fn new(snapshots: Vec<OptionsChainSnapshot>) -> Self {
        Self { snapshots }
    }

    /// Loads a JSON array of snapshots.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read chain fixture {}", path.display()))?;
        let snapshots: Vec<OptionsChainSnapshot> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse chain fixture {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            snapshots = snapshots.len(),
            "Loaded options chain fixture"
        );
        Ok(Self::new(snapshots))
    }

    #[must_use]
    pub fn snapshots(&self) -> &[OptionsChainSnapshot] {
        &self.snapshots
    }

    fn resolve(
        &self,
        symbol: &str,
        expiries: &[String],
        now: DateTime<Utc>,
    ) -> Vec<OptionsChainSnapshot> {
        let by_expiry: BTreeMap<DateTime<Utc>, &OptionsChainSnapshot> = self
            .snapshots
            .iter()
            .filter(|s| s.symbol.eq_ignore_ascii_case(symbol))
            .map(|s| (s.expiry, s))
            .collect();

        if expiries.is_empty() {
            return by_expiry.into_values().cloned().collect();
        }

        let mut selected: BTreeMap<DateTime<Utc>, OptionsChainSnapshot> = BTreeMap::new();
        for requested in normalize_expiries(expiries, now) {
            match select_nearest(&by_expiry, requested) {
                Some((expiry, snapshot)) => {
                    selected.entry(expiry).or_insert_with(|| (*snapshot).clone());
                }
                None => {
                    tracing::warn!(
                        symbol,
                        expiry = %requested.format("%Y-%m-%d"),
                        "No fixture snapshot for symbol"
                    );
                }
            }
        }
        selected.into_values().collect()
    }
}

#[async_trait]
impl MarketDataProvider for StaticChainProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_options_chain(
        &self,
        symbol: &str,
        expiries: &[String],
    ) -> Result<Vec<OptionsChainSnapshot>> {
        Ok(self.resolve(symbol, expiries, Utc::now()))
    }
}
