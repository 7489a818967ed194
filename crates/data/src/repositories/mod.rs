//! Database repositories.

pub mod trade_history_repo;

pub use trade_history_repo::TradeHistoryRepository;
