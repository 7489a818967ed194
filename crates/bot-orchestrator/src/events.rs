use crate::cycle::StageFailure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smirk_trade_core::TradingSignal;
use smirk_trade_data::TradeRecord;
use smirk_trade_signals::SentimentResult;

/// Progress notifications broadcast by the cycle orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BotEvent {
    /// Sentiment read for one expiry.
    SentimentClassified(SentimentResult),

    /// Signal emitted (after any overlay merge).
    SignalGenerated(TradingSignal),

    /// Trade accepted by the sink and applied to the portfolio.
    TradeRecorded(TradeRecord),

    /// A stage failed for one expiry or for the whole cycle.
    StageFailed(StageFailure),

    /// Cycle returned to idle.
    CycleCompleted {
        snapshots: usize,
        signals: usize,
        trades: usize,
        failures: usize,
        timestamp: DateTime<Utc>,
    },
}
