//! One-shot smirk analysis over a fixture.

use super::load_config;
use super::run::overlay_sources;
use anyhow::Result;
use clap::Args;
use smirk_trade_bot_orchestrator::{CycleOrchestrator, CycleReport};
use smirk_trade_core::OptionsChainSnapshot;
use smirk_trade_data::{InMemoryTradeSink, StaticChainProvider};
use smirk_trade_signals::{detect_regimes, Sentiment};
use std::fmt::Write as _;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// JSON array of options-chain snapshots
    #[arg(long)]
    pub fixture: PathBuf,

    /// Config file path
    #[arg(short, long, default_value = "config/smirk.toml")]
    pub config: PathBuf,

    /// Only analyze the configured expiries instead of every fixture expiry
    #[arg(long)]
    pub configured_expiries: bool,

    /// JSON list of external feature sets merged into signals as an overlay
    #[arg(long)]
    pub alpha: Option<PathBuf>,

    /// Strikes per rolling window when labelling IV regimes
    #[arg(long, default_value = "5")]
    pub regime_window: usize,
}

pub async fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;
    if !args.configured_expiries {
        config.expiries.clear();
    }
    let provider = StaticChainProvider::from_json_file(&args.fixture)?;

    let mut orchestrator = CycleOrchestrator::new(config, provider, InMemoryTradeSink::new())
        .with_overlay_sources(overlay_sources(args.alpha.as_deref())?);
    let report = orchestrator.run_cycle().await;

    print!("{}", render(&report));

    let underlying = &orchestrator.config().underlying;
    let chains: Vec<OptionsChainSnapshot> = orchestrator
        .provider()
        .snapshots()
        .iter()
        .filter(|s| s.symbol.eq_ignore_ascii_case(underlying))
        .cloned()
        .collect();
    print!("{}", render_regimes(&chains, args.regime_window));
    Ok(())
}

/// Human-readable breakdown of one cycle.
#[must_use]
pub fn render(report: &CycleReport) -> String {
    let mut out = String::new();
    for (skew, sentiment) in report.skew_results.iter().zip(&report.sentiments) {
        let metric = skew
            .skew
            .map_or_else(|| "n/a".to_string(), |s| format!("{s:+.4}"));
        let _ = writeln!(
            out,
            "{} {}  skew={metric} (calls={} puts={})  sentiment={} confidence={:.2}",
            skew.symbol,
            skew.expiry.format("%Y-%m-%d"),
            skew.num_otm_calls,
            skew.num_otm_puts,
            sentiment.sentiment,
            sentiment.confidence,
        );
    }
    for signal in &report.signals {
        let _ = writeln!(
            out,
            "signal: {} @ {} confidence={:.2} source={}",
            signal.action.as_str(),
            signal.price,
            signal.confidence,
            signal.source,
        );
    }
    if report.signals.is_empty() {
        out.push_str("signal: none\n");
    }
    for failure in &report.failures {
        let _ = writeln!(
            out,
            "failed [{}] {}: {}",
            failure.stage,
            failure.expiry.as_deref().unwrap_or("-"),
            failure.message
        );
    }
    out
}

/// One line per chain counting the strikes in each IV regime, plus the
/// outlier strikes.
#[must_use]
pub fn render_regimes(chains: &[OptionsChainSnapshot], window: usize) -> String {
    let mut out = String::new();
    for chain in chains {
        let points = detect_regimes(chain, window);
        let count = |label: Sentiment| points.iter().filter(|p| p.regime == Some(label)).count();
        let outliers: Vec<String> = points
            .iter()
            .filter(|p| matches!(p.regime, Some(Sentiment::Bullish | Sentiment::Bearish)))
            .map(|p| format!("{}:{}", p.strike, p.regime.map_or("-", |r| r.as_str())))
            .collect();
        let _ = writeln!(
            out,
            "regimes {} {}  bullish={} bearish={} neutral={}  outliers=[{}]",
            chain.symbol,
            chain.expiry.format("%Y-%m-%d"),
            count(Sentiment::Bullish),
            count(Sentiment::Bearish),
            count(Sentiment::Neutral),
            outliers.join(" "),
        );
    }
    out
}
