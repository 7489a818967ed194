use crate::commands::{BotCommand, BotStatus};
use crate::cycle::CycleReport;
use anyhow::Result;
use smirk_trade_core::AppConfig;
use tokio::sync::{mpsc, oneshot};

#[derive(Clone)]
pub struct BotHandle {
    tx: mpsc::Sender<BotCommand>,
}

impl BotHandle {
    /// Creates a new bot handle with the given command sender.
    #[must_use]
    pub const fn new(tx: mpsc::Sender<BotCommand>) -> Self {
        Self { tx }
    }

    /// Starts scheduled cycles; the first runs immediately.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the bot actor.
    pub async fn start(&self) -> Result<()> {
        self.tx.send(BotCommand::Start).await?;
        Ok(())
    }

    /// Stops scheduled cycles.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the bot actor.
    pub async fn stop(&self) -> Result<()> {
        self.tx.send(BotCommand::Stop).await?;
        Ok(())
    }

    /// Runs one cycle now and waits for its report.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent or the response cannot be received.
    pub async fn run_once(&self) -> Result<CycleReport> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(BotCommand::RunOnce(tx)).await?;
        let report = rx.await?;
        Ok(report)
    }

    /// Replaces the configuration used from the next cycle on.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the bot actor.
    pub async fn update_config(&self, config: AppConfig) -> Result<()> {
        self.tx.send(BotCommand::UpdateConfig(Box::new(config))).await?;
        Ok(())
    }

    /// Gets the current status of the bot.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent or the response cannot be received.
    pub async fn get_status(&self) -> Result<BotStatus> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(BotCommand::GetStatus(tx)).await?;
        let status = rx.await?;
        Ok(status)
    }

    /// Shuts down the bot.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the bot actor.
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(BotCommand::Shutdown).await?;
        Ok(())
    }
}
