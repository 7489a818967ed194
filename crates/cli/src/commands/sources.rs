//! Concrete chain providers and trade sinks selected at startup.

use anyhow::Result;
use async_trait::async_trait;
use smirk_trade_core::{AppConfig, OptionsChainSnapshot, TradingMode};
use smirk_trade_data::{
    CachedProvider, DatabaseClient, DeribitClient, InMemoryTradeSink, MarketDataProvider,
    StaticChainProvider, TradeHistoryRepository, TradeRecord, TradeSink,
};
use std::path::Path;
use std::time::Duration;

pub enum ChainSource {
    Fixture(StaticChainProvider),
    Deribit(CachedProvider<DeribitClient>),
}

impl ChainSource {
    /// Serves `fixture` (or the configured fixture) when given, otherwise the
    /// cached Deribit client.
    ///
    /// # Errors
    /// Returns an error if the fixture cannot be loaded or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &AppConfig, fixture: Option<&Path>) -> Result<Self> {
        if let Some(path) = fixture.or(config.data.fixture_path.as_deref()) {
            return Ok(Self::Fixture(StaticChainProvider::from_json_file(path)?));
        }
        Self::deribit(config)
    }

    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn deribit(config: &AppConfig) -> Result<Self> {
        let client = DeribitClient::new(&config.data)?;
        tracing::info!(
            base_url = client.base_url(),
            cache_dir = %config.data.cache_dir.display(),
            ttl_secs = config.data.cache_ttl_secs,
            "Using Deribit options data"
        );
        Ok(Self::Deribit(CachedProvider::new(
            client,
            &config.data.cache_dir,
            Duration::from_secs(config.data.cache_ttl_secs),
        )))
    }
}

#[async_trait]
impl MarketDataProvider for ChainSource {
    fn name(&self) -> &str {
        match self {
            Self::Fixture(p) => p.name(),
            Self::Deribit(p) => p.name(),
        }
    }

    async fn fetch_options_chain(
        &self,
        symbol: &str,
        expiries: &[String],
    ) -> Result<Vec<OptionsChainSnapshot>> {
        match self {
            Self::Fixture(p) => p.fetch_options_chain(symbol, expiries).await,
            Self::Deribit(p) => p.fetch_options_chain(symbol, expiries).await,
        }
    }
}

#[derive(Clone)]
pub enum RecordingSink {
    Memory(InMemoryTradeSink),
    Postgres(TradeHistoryRepository),
}

impl RecordingSink {
    /// PostgreSQL in live mode when `database.url` is set, memory otherwise.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable or the schema cannot
    /// be created.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        match (&config.database.url, config.trading_mode) {
            (Some(url), TradingMode::Live) => {
                let db = DatabaseClient::connect(url, config.database.max_connections).await?;
                db.ensure_schema().await?;
                tracing::info!("Recording trades to PostgreSQL");
                Ok(Self::Postgres(db.trade_history()))
            }
            _ => {
                tracing::info!("Recording trades in memory");
                Ok(Self::Memory(InMemoryTradeSink::new()))
            }
        }
    }

    /// Trades recorded for `symbol`, oldest first.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn history(&self, symbol: &str) -> Result<Vec<TradeRecord>> {
        match self {
            Self::Memory(sink) => Ok(sink
                .records()
                .into_iter()
                .filter(|r| r.symbol == symbol)
                .collect()),
            Self::Postgres(repo) => repo.by_symbol(symbol).await,
        }
    }
}

#[async_trait]
impl TradeSink for RecordingSink {
    async fn record(&self, trade: &TradeRecord) -> Result<i64> {
        match self {
            Self::Memory(sink) => sink.record(trade).await,
            Self::Postgres(repo) => repo.record(trade).await,
        }
    }
}
