//! Market data and trade persistence for the volatility smirk trader.
//!
//! This crate provides:
//! - The `MarketDataProvider` seam with Deribit, fixture and cached implementations
//! - Expiry normalization shared by the providers
//! - Trade history models, the `TradeSink` seam and its PostgreSQL repository
//! - CSV import/export for returns and trade history

pub mod cache;
pub mod csv_storage;
pub mod database;
pub mod deribit;
pub mod error;
pub mod expiry;
pub mod models;
pub mod provider;
pub mod repositories;
pub mod sink;

pub use cache::CachedProvider;
pub use csv_storage::CsvStorage;
pub use database::DatabaseClient;
pub use deribit::{BookSummary, DeribitClient, DeribitInstrument, DERIBIT_API_URL};
pub use error::DataError;
pub use expiry::{normalize_expiries, parse_expiry, select_nearest};
pub use models::{TradeRecord, TradeStatus};
pub use provider::{MarketDataProvider, StaticChainProvider};
pub use repositories::TradeHistoryRepository;
pub use sink::{InMemoryTradeSink, TradeSink};
