use crate::bot_handle::BotHandle;
use crate::commands::{BotCommand, BotState, BotStatus};
use crate::cycle::{CycleOrchestrator, CycleReport};
use anyhow::Result;
use chrono::{DateTime, Utc};
use smirk_trade_core::AppConfig;
use smirk_trade_data::{MarketDataProvider, TradeSink};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

const COMMAND_BUFFER: usize = 32;

/// Owns the cycle orchestrator and runs it on a fixed interval.
///
/// Commands are handled between cycles, so a cycle in flight always
/// completes before a stop, config change or shutdown takes effect.
pub struct BotActor<P, S> {
    orchestrator: CycleOrchestrator<P, S>,
    rx: mpsc::Receiver<BotCommand>,
    config_rx: Option<watch::Receiver<AppConfig>>,
    state: BotState,
    cycles_run: u64,
    last_cycle_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl<P, S> BotActor<P, S>
where
    P: MarketDataProvider + 'static,
    S: TradeSink + 'static,
{
    /// Creates a stopped actor.
    #[must_use]
    pub fn new(orchestrator: CycleOrchestrator<P, S>, rx: mpsc::Receiver<BotCommand>) -> Self {
        Self {
            orchestrator,
            rx,
            config_rx: None,
            state: BotState::Stopped,
            cycles_run: 0,
            last_cycle_at: None,
            last_error: None,
        }
    }

    /// Picks up configuration published by a [`smirk_trade_core::ConfigWatcher`]
    /// before each scheduled cycle.
    #[must_use]
    pub fn with_config_watch(mut self, config_rx: watch::Receiver<AppConfig>) -> Self {
        self.config_rx = Some(config_rx);
        self
    }

    #[must_use]
    pub const fn state(&self) -> BotState {
        self.state
    }

    /// Spawns the actor on the current runtime.
    #[must_use]
    pub fn spawn(
        orchestrator: CycleOrchestrator<P, S>,
        config_rx: Option<watch::Receiver<AppConfig>>,
    ) -> (BotHandle, JoinHandle<Result<()>>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let mut actor = Self::new(orchestrator, rx);
        actor.config_rx = config_rx;
        let task = tokio::spawn(actor.run());
        (BotHandle::new(tx), task)
    }

    /// Runs until a shutdown command arrives or every handle is dropped.
    ///
    /// # Errors
    /// Currently infallible; cycle failures are reported, never propagated.
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(
            symbol = %self.orchestrator.config().symbol,
            mode = self.orchestrator.config().trading_mode.as_str(),
            "Bot actor starting"
        );
        let mut ticker = immediate_ticker(self.interval());

        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    let Some(cmd) = cmd else {
                        tracing::info!("All bot handles dropped");
                        break;
                    };
                    if !self.handle_command(cmd, &mut ticker).await {
                        break;
                    }
                }
                _ = ticker.tick(), if self.state == BotState::Running => {
                    self.apply_watched_config(&mut ticker);
                    self.run_cycle().await;
                }
            }
        }

        tracing::info!(cycles = self.cycles_run, "Bot actor stopped");
        Ok(())
    }

    /// Returns false when the loop should exit.
    async fn handle_command(&mut self, cmd: BotCommand, ticker: &mut Interval) -> bool {
        match cmd {
            BotCommand::Start => {
                if self.state == BotState::Running {
                    tracing::warn!("Bot already running, ignoring start");
                    return true;
                }
                self.state = BotState::Running;
                *ticker = immediate_ticker(self.interval());
                tracing::info!(interval_secs = self.interval().as_secs(), "Bot running");
            }
            BotCommand::Stop => {
                if self.state == BotState::Stopped {
                    tracing::warn!("Bot already stopped, ignoring stop");
                    return true;
                }
                self.state = BotState::Stopped;
                tracing::info!("Bot stopped");
            }
            BotCommand::RunOnce(reply) => {
                let report = self.run_cycle().await;
                // Caller may have given up waiting.
                let _ = reply.send(report);
            }
            BotCommand::UpdateConfig(config) => {
                self.apply_config(*config, ticker);
            }
            BotCommand::GetStatus(reply) => {
                let _ = reply.send(self.status());
            }
            BotCommand::Shutdown => {
                tracing::info!("Bot shutting down");
                return false;
            }
        }
        true
    }

    async fn run_cycle(&mut self) -> CycleReport {
        let report = self.orchestrator.run_cycle().await;
        self.cycles_run += 1;
        self.last_cycle_at = Some(Utc::now());
        self.last_error = report.failures.last().map(|f| f.message.clone());

        tracing::info!(
            cycle = self.cycles_run,
            snapshots = report.snapshots_fetched,
            signals = report.signals.len(),
            trades = report.trades_recorded,
            failures = report.failures.len(),
            "Cycle complete"
        );
        report
    }

    fn apply_watched_config(&mut self, ticker: &mut Interval) {
        let Some(config_rx) = self.config_rx.as_mut() else {
            return;
        };
        if !config_rx.has_changed().unwrap_or(false) {
            return;
        }
        let config = config_rx.borrow_and_update().clone();
        self.apply_config(config, ticker);
    }

    fn apply_config(&mut self, config: AppConfig, ticker: &mut Interval) {
        let previous = self.interval();
        self.orchestrator.update_config(config);

        let interval = self.interval();
        if interval != previous {
            tracing::info!(
                from_secs = previous.as_secs(),
                to_secs = interval.as_secs(),
                "Cycle interval changed"
            );
            *ticker = delayed_ticker(interval);
        }
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.orchestrator.config().scheduler.cycle_interval_secs.max(1))
    }

    fn status(&self) -> BotStatus {
        let portfolio = self.orchestrator.portfolio();
        BotStatus {
            state: self.state,
            cycles_run: self.cycles_run,
            last_cycle_at: self.last_cycle_at,
            last_error: self.last_error.clone(),
            cash: portfolio.cash(),
            open_positions: portfolio.open_positions(),
            metrics: self.orchestrator.metrics().snapshot(),
        }
    }
}

fn immediate_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn delayed_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
