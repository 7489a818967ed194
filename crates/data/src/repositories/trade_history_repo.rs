//! Trade history repository.
//!
//! Stores and queries paper trades emitted by the trading cycle.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::TradeRecord;
use crate::sink::TradeSink;

/// Repository for `trade_history` operations.
#[derive(Debug, Clone)]
pub struct TradeHistoryRepository {
    pool: PgPool,
}

impl TradeHistoryRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a trade and returns the generated ID.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn insert(&self, record: &TradeRecord) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO trade_history
                (execution_time, symbol, trade_type, executed_price, quantity,
                 limit_price, status, execution_id, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(record.execution_time)
        .bind(&record.symbol)
        .bind(&record.trade_type)
        .bind(record.executed_price)
        .bind(record.quantity)
        .bind(record.limit_price)
        .bind(&record.status)
        .bind(&record.execution_id)
        .bind(&record.note)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Gets the most recent trades, newest first.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn recent(&self, limit: i64) -> Result<Vec<TradeRecord>> {
        let records = sqlx::query_as::<_, TradeRecord>(
            r#"
            SELECT id, execution_time, symbol, trade_type, executed_price, quantity,
                   limit_price, status, execution_id, note
            FROM trade_history
            ORDER BY execution_time DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Gets all trades for a symbol, oldest first.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn by_symbol(&self, symbol: &str) -> Result<Vec<TradeRecord>> {
        let records = sqlx::query_as::<_, TradeRecord>(
            r#"
            SELECT id, execution_time, symbol, trade_type, executed_price, quantity,
                   limit_price, status, execution_id, note
            FROM trade_history
            WHERE symbol = $1
            ORDER BY execution_time ASC
            "#,
        )
        .bind(symbol)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

#[async_trait]
impl TradeSink for TradeHistoryRepository {
    async fn record(&self, trade: &TradeRecord) -> Result<i64> {
        let id = self.insert(trade).await?;
        tracing::debug!(id, symbol = %trade.symbol, side = %trade.trade_type, "Trade persisted");
        Ok(id)
    }
}
