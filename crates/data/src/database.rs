use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::repositories::TradeHistoryRepository;

const TRADE_HISTORY_SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS trade_history (
    id              BIGSERIAL PRIMARY KEY,
    execution_time  TIMESTAMPTZ NOT NULL,
    symbol          TEXT NOT NULL,
    trade_type      TEXT NOT NULL CHECK (trade_type IN ('BUY', 'SELL')),
    executed_price  NUMERIC NOT NULL,
    quantity        NUMERIC NOT NULL,
    limit_price     NUMERIC,
    status          TEXT NOT NULL CHECK (status IN ('PENDING', 'EXECUTED', 'FAILED')),
    execution_id    TEXT,
    note            TEXT
)";

const TRADE_HISTORY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS trade_history_symbol_time_idx
    ON trade_history (symbol, execution_time DESC)";

pub struct DatabaseClient {
    pool: PgPool,
}

impl DatabaseClient {
    /// Connects to the `PostgreSQL` database at `database_url`.
    ///
    /// # Errors
    /// Returns an error if the database connection cannot be established.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .context("Failed to connect to trade history database")?;
        tracing::info!(max_connections, "Connected to trade history database");
        Ok(Self { pool })
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the trade history table and index when missing.
    ///
    /// # Errors
    /// Returns an error if either statement fails.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(TRADE_HISTORY_SCHEMA)
            .execute(&self.pool)
            .await
            .context("Failed to create trade_history table")?;
        sqlx::query(TRADE_HISTORY_INDEX)
            .execute(&self.pool)
            .await
            .context("Failed to create trade_history index")?;
        Ok(())
    }

    #[must_use]
    pub fn trade_history(&self) -> TradeHistoryRepository {
        TradeHistoryRepository::new(self.pool.clone())
    }
}
