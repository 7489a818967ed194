//! Persisted data models.
//!
//! Models use `rust_decimal::Decimal` for money and derive `sqlx::FromRow`.

pub mod trade_record;

pub use trade_record::{TradeRecord, TradeStatus};
