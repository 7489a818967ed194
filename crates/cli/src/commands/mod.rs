//! CLI commands for the smirk trader.

pub mod analyze;
pub mod backtest;
pub mod report;
pub mod run;
pub mod sources;

pub use analyze::{run_analyze, AnalyzeArgs};
pub use backtest::{run_backtest, BacktestArgs};
pub use report::{run_report, ReportArgs};
pub use run::{run_bot, RunArgs};

use anyhow::Result;
use smirk_trade_core::{AppConfig, ConfigLoader};
use std::path::Path;

/// Loads the layered config; a missing file falls back to defaults.
///
/// # Errors
/// Returns an error if a present file is malformed or fails validation.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "Config file not found, using defaults and BOT_ overrides");
    }
    ConfigLoader::load(path)
}

/// Resolves on SIGINT or SIGTERM.
///
/// # Errors
/// Returns an error if the signal handlers cannot be installed.
#[cfg(unix)]
pub async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        }
    }
    Ok(())
}

/// Resolves on Ctrl+C.
///
/// # Errors
/// Returns an error if the signal handler cannot be installed.
#[cfg(not(unix))]
pub async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
    Ok(())
}
