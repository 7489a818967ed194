//! Daily risk report from a return history.

use super::load_config;
use anyhow::Result;
use clap::Args;
use smirk_trade_core::{AppConfig, Portfolio, RiskBudgeter, RiskReport};
use smirk_trade_data::CsvStorage;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// CSV of periodic returns ("return" column, or the first column)
    #[arg(long)]
    pub returns: PathBuf,

    /// Markdown output path
    #[arg(short, long, default_value = "reports/risk_report.md")]
    pub output: PathBuf,

    /// Config file path
    #[arg(short, long, default_value = "config/smirk.toml")]
    pub config: PathBuf,

    /// Signal strength used to size the reported allocation
    #[arg(long, default_value = "0.5")]
    pub signal_strength: f64,
}

/// # Errors
/// Returns an error if the config, the returns file or the output path fail.
pub fn run_report(args: &ReportArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let returns = CsvStorage::read_returns(&args.returns)?;
    let report = build_report(&config, &returns, args.signal_strength);

    let path = report.save(&args.output)?;
    println!("Risk report written to {}", path.display());
    Ok(())
}

/// Report for a flat book holding the configured capital.
#[must_use]
pub fn build_report(config: &AppConfig, returns: &[f64], signal_strength: f64) -> RiskReport {
    let portfolio = Portfolio::new(config.risk.capital, config.risk.max_open_positions);
    let budget = RiskBudgeter::new(config.risk.clone()).size_position(signal_strength);
    RiskReport::from_portfolio(&portfolio, &HashMap::new(), returns, &budget, &config.risk)
}
