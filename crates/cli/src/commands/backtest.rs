//! Event-log replay with optional walk-forward breakdown.

use super::load_config;
use anyhow::Result;
use clap::Args;
use smirk_trade_backtest::{
    read_event_log, smirk_pipeline, walk_forward_windows, EquityCurve, PerformanceSummary,
    ReplayEngine,
};
use smirk_trade_core::AppConfig;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct BacktestArgs {
    /// Config file path
    #[arg(short, long, default_value = "config/smirk.toml")]
    pub config: PathBuf,

    #[command(flatten)]
    pub replay: ReplayArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// JSON-lines log of bar and options-chain events
    #[arg(long)]
    pub events: PathBuf,

    /// Training days per walk-forward window
    #[arg(long, requires = "test_days")]
    pub train_days: Option<i64>,

    /// Test days per walk-forward window
    #[arg(long, requires = "train_days")]
    pub test_days: Option<i64>,
}

/// # Errors
/// Returns an error if the config or event log cannot be loaded.
pub fn run_backtest(args: &BacktestArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    run_replay(&config, &args.replay)
}

/// Replays the log through the smirk pipeline and prints the summary.
///
/// # Errors
/// Returns an error if the event log cannot be read.
pub fn run_replay(config: &AppConfig, args: &ReplayArgs) -> Result<()> {
    let events = read_event_log(&args.events)?;
    tracing::info!(path = %args.events.display(), events = events.len(), "Replaying event log");

    let curve = ReplayEngine::new(smirk_pipeline(config)).run(&events);
    print_summary("overall", &curve.summary());

    if let (Some(train), Some(test)) = (args.train_days, args.test_days) {
        for (i, summary) in window_summaries(&curve, train, test).iter().enumerate() {
            print_summary(&format!("window {}", i + 1), summary);
        }
    }
    Ok(())
}

/// Out-of-sample summaries, one per walk-forward window.
#[must_use]
pub fn window_summaries(curve: &EquityCurve, train_days: i64, test_days: i64) -> Vec<PerformanceSummary> {
    let timestamps: Vec<_> = curve.points.iter().map(|p| p.timestamp).collect();
    walk_forward_windows(&timestamps, train_days, test_days)
        .iter()
        .map(|window| curve.rebased(|p| window.in_test(p.timestamp)).summary())
        .collect()
}

fn print_summary(label: &str, summary: &PerformanceSummary) {
    println!(
        "{label:>10}: total_return={:+.4} max_drawdown={:.4} sharpe={:.2}",
        summary.total_return, summary.max_drawdown, summary.sharpe
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn one_summary_per_window() {
        let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut curve = EquityCurve::new();
        for day in 0..41 {
            curve.push(origin + Duration::days(day), 0.001);
        }

        let summaries = window_summaries(&curve, 20, 10);

        assert_eq!(summaries.len(), 2);
        let expected = 1.001_f64.powi(10) - 1.0;
        assert!((summaries[0].total_return - expected).abs() < 1e-12);
    }
}
