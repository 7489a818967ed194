//! Trade history model.
//!
//! One row per executed (or attempted) paper trade emitted by the cycle.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smirk_trade_core::TradeSide;

/// Lifecycle status of a recorded trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    /// Submitted but not yet confirmed.
    Pending,
    /// Filled.
    Executed,
    /// Rejected or errored.
    Failed,
}

impl TradeStatus {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Executed => "EXECUTED",
            Self::Failed => "FAILED",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "EXECUTED" => Some(Self::Executed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A row of the `trade_history` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TradeRecord {
    /// Database ID; zero until persisted.
    pub id: i64,
    pub execution_time: DateTime<Utc>,
    pub symbol: String,
    /// "BUY" or "SELL".
    pub trade_type: String,
    pub executed_price: Decimal,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    /// "PENDING", "EXECUTED" or "FAILED".
    pub status: String,
    /// Venue or paper execution identifier.
    pub execution_id: Option<String>,
    pub note: Option<String>,
}

impl TradeRecord {
    /// Creates an executed trade record.
    #[must_use]
    pub fn executed(
        execution_time: DateTime<Utc>,
        symbol: impl Into<String>,
        side: TradeSide,
        executed_price: Decimal,
        quantity: Decimal,
    ) -> Self {
        Self {
            id: 0,
            execution_time,
            symbol: symbol.into(),
            trade_type: side.as_str().to_string(),
            executed_price,
            quantity,
            limit_price: None,
            status: TradeStatus::Executed.as_str().to_string(),
            execution_id: None,
            note: None,
        }
    }

    #[must_use]
    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = Some(execution_id.into());
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub const fn with_limit_price(mut self, limit_price: Decimal) -> Self {
        self.limit_price = Some(limit_price);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: TradeStatus) -> Self {
        self.status = status.as_str().to_string();
        self
    }

    #[must_use]
    pub fn side(&self) -> Option<TradeSide> {
        TradeSide::parse(&self.trade_type)
    }

    #[must_use]
    pub fn trade_status(&self) -> Option<TradeStatus> {
        TradeStatus::parse(&self.status)
    }

    /// Executed price times quantity.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.executed_price * self.quantity
    }
}
