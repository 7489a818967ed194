use crate::cycle::CycleReport;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smirk_trade_core::{AppConfig, MetricsSnapshot};
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum BotCommand {
    /// Begin cycling on the configured interval.
    Start,
    /// Stop scheduling; an in-flight cycle always completes first.
    Stop,
    /// Run a single cycle now, whatever the state, and reply with its report.
    RunOnce(oneshot::Sender<CycleReport>),
    UpdateConfig(Box<AppConfig>),
    GetStatus(oneshot::Sender<BotStatus>),
    Shutdown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BotState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotStatus {
    pub state: BotState,
    pub cycles_run: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    /// Most recent stage failure, cleared by a clean cycle.
    pub last_error: Option<String>,
    pub cash: Decimal,
    pub open_positions: usize,
    pub metrics: MetricsSnapshot,
}
