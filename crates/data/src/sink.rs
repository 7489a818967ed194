//! Destination for trade records emitted by the trading cycle.

use crate::models::TradeRecord;
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Persists trade records and hands back their assigned IDs.
#[async_trait]
pub trait TradeSink: Send + Sync {
    /// Records one trade.
    ///
    /// # Errors
    /// Returns an error if the record could not be persisted.
    async fn record(&self, trade: &TradeRecord) -> Result<i64>;
}

/// Keeps trades in process memory. Used when no database is configured.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTradeSink {
    records: Arc<Mutex<Vec<TradeRecord>>>,
}

impl InMemoryTradeSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record stored so far, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<TradeRecord> {
        self.records.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl TradeSink for InMemoryTradeSink {
    async fn record(&self, trade: &TradeRecord) -> Result<i64> {
        let mut records = self.records.lock();
        let id = i64::try_from(records.len())? + 1;
        let mut stored = trade.clone();
        stored.id = id;
        records.push(stored);
        Ok(id)
    }
}
