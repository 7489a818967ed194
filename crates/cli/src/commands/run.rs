//! Scheduled trading loop.

use super::backtest::{run_replay, ReplayArgs};
use super::sources::{ChainSource, RecordingSink};
use super::{load_config, shutdown_signal};
use anyhow::{Context, Result};
use clap::Args;
use smirk_trade_bot_orchestrator::{BotActor, CycleOrchestrator};
use smirk_trade_core::{AppConfig, ConfigWatcher, TradingMode};
use smirk_trade_data::CsvStorage;
use smirk_trade_strategy::{FeatureSource, StaticFeatures};
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Trading mode: live, paper or backtest
    #[arg(long, default_value = "paper")]
    pub mode: String,

    /// Traded symbol, e.g. BTC-USD; the options underlying is the part before '-'
    #[arg(long)]
    pub symbol: Option<String>,

    /// Seconds between cycles
    #[arg(long)]
    pub interval: Option<u64>,

    /// Config file path
    #[arg(short, long, default_value = "config/smirk.toml")]
    pub config: PathBuf,

    /// Reload the config file when it changes
    #[arg(long)]
    pub watch_config: bool,

    /// JSON array of options-chain snapshots served instead of Deribit
    #[arg(long)]
    pub fixture: Option<PathBuf>,

    /// JSON-lines event log replayed in backtest mode
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// JSON list of external feature sets merged into signals as an overlay
    #[arg(long)]
    pub alpha: Option<PathBuf>,

    /// Write the session's recorded trades to this CSV file on shutdown
    #[arg(long)]
    pub export_trades: Option<PathBuf>,
}

/// Applies CLI overrides on top of the loaded config.
///
/// # Errors
/// Returns an error if the mode is unknown or the result fails validation.
pub fn apply_overrides(mut config: AppConfig, args: &RunArgs) -> Result<AppConfig> {
    config.trading_mode = TradingMode::parse(&args.mode).with_context(|| {
        format!("Invalid mode '{}'. Valid values: live, paper, backtest", args.mode)
    })?;
    if let Some(symbol) = &args.symbol {
        config.symbol = symbol.to_uppercase();
        config.underlying = underlying_of(&config.symbol).to_string();
    }
    if let Some(interval) = args.interval {
        config.scheduler.cycle_interval_secs = interval;
    }
    config.validate()?;
    Ok(config)
}

fn underlying_of(symbol: &str) -> &str {
    symbol.split(['-', '/']).next().unwrap_or(symbol)
}

/// Loads `--alpha` feature sets as overlay sources.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn overlay_sources(alpha: Option<&Path>) -> Result<Vec<FeatureSource>> {
    let Some(path) = alpha else {
        return Ok(Vec::new());
    };
    let sources: Vec<FeatureSource> = StaticFeatures::from_json_file(path)?
        .into_iter()
        .map(FeatureSource::Static)
        .collect();
    tracing::info!(path = %path.display(), sources = sources.len(), "Loaded alpha overlay");
    Ok(sources)
}

pub async fn run_bot(args: RunArgs) -> Result<()> {
    let config = apply_overrides(load_config(&args.config)?, &args)?;
    tracing::info!(
        mode = config.trading_mode.as_str(),
        symbol = %config.symbol,
        underlying = %config.underlying,
        interval_secs = config.scheduler.cycle_interval_secs,
        "Starting smirk trader"
    );

    if config.trading_mode == TradingMode::Backtest {
        let events = args
            .events
            .context("Backtest mode requires --events <FILE>")?;
        return run_replay(
            &config,
            &ReplayArgs {
                events,
                train_days: None,
                test_days: None,
            },
        );
    }

    let provider = if config.trading_mode == TradingMode::Live {
        if args.fixture.is_some() {
            tracing::warn!("Ignoring --fixture in live mode");
        }
        ChainSource::deribit(&config)?
    } else {
        ChainSource::from_config(&config, args.fixture.as_deref())?
    };
    let sink = RecordingSink::from_config(&config).await?;
    let orchestrator = CycleOrchestrator::new(config.clone(), provider, sink.clone())
        .with_overlay_sources(overlay_sources(args.alpha.as_deref())?);

    let config_rx = if args.watch_config {
        let (watcher, rx) = ConfigWatcher::new(&args.config, config.clone());
        let overrides = args.clone();
        let watcher = watcher.with_overrides(move |reloaded| apply_overrides(reloaded, &overrides));
        tokio::spawn(async move {
            if let Err(e) = watcher.watch().await {
                tracing::error!(error = %e, "Config watcher stopped");
            }
        });
        tracing::info!(path = %args.config.display(), "Watching config for changes");
        Some(rx)
    } else {
        None
    };

    let (handle, task) = BotActor::spawn(orchestrator, config_rx);
    handle.start().await?;

    shutdown_signal().await?;

    tracing::info!("Stopping scheduler");
    handle.stop().await?;
    let status = handle.get_status().await?;
    handle.shutdown().await?;
    task.await??;

    tracing::info!(
        cycles = status.cycles_run,
        cash = %status.cash,
        open_positions = status.open_positions,
        last_error = status.last_error.as_deref().unwrap_or("-"),
        "Scheduler stopped"
    );

    if let Some(path) = &args.export_trades {
        let trades = sink.history(&config.symbol).await?;
        CsvStorage::write_trades(path, &trades)?;
        tracing::info!(path = %path.display(), trades = trades.len(), "Exported trades");
    }
    Ok(())
}
