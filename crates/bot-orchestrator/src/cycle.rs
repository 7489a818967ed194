//! One trading cycle, end to end.
//!
//! ```text
//! Idle → FetchingData → AnalyzingSkew → ClassifyingSentiment
//!      → GeneratingSignal → SizingAndRecording → Idle
//! ```
//!
//! Only the fetch and the trade sink suspend. A failing fetch ends the cycle
//! with no data; a failing expiry is recorded and skipped; a failing sink
//! drops the trade intent and leaves the portfolio untouched. Nothing
//! escapes [`CycleOrchestrator::run_cycle`], so the scheduling loop survives
//! every tick.

use crate::events::BotEvent;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smirk_trade_core::{
    combine, AppConfig, MetricsRegistry, OptionsChainSnapshot, PipelineError, Portfolio,
    RiskBudgeter, SignalAction, TradeSide, TradingMode, TradingSignal,
};
use smirk_trade_data::{MarketDataProvider, TradeRecord, TradeSink};
use smirk_trade_signals::{
    SentimentClassifier, SentimentResult, SignalGenerator, SkewEngine, SkewResult,
};
use smirk_trade_strategy::{FeatureSource, SmirkFeatures, StrategyEngine};
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleState {
    #[default]
    Idle,
    FetchingData,
    AnalyzingSkew,
    ClassifyingSentiment,
    GeneratingSignal,
    SizingAndRecording,
}

impl CycleState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FetchingData => "fetching_data",
            Self::AnalyzingSkew => "analyzing_skew",
            Self::ClassifyingSentiment => "classifying_sentiment",
            Self::GeneratingSignal => "generating_signal",
            Self::SizingAndRecording => "sizing_and_recording",
        }
    }
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure caught at a stage boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: CycleState,
    /// `YYYY-MM-DD` of the affected expiry; `None` when the whole stage failed.
    pub expiry: Option<String>,
    pub message: String,
}

impl StageFailure {
    fn new(stage: CycleState, expiry: Option<String>, error: &PipelineError) -> Self {
        Self {
            stage,
            expiry,
            message: error.to_string(),
        }
    }
}

/// Everything one cycle produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleReport {
    pub snapshots_fetched: usize,
    pub skew_results: Vec<SkewResult>,
    pub sentiments: Vec<SentimentResult>,
    pub signals: Vec<TradingSignal>,
    pub trades_recorded: usize,
    /// The persisted trade, with the id assigned by the sink.
    pub recorded_trade: Option<TradeRecord>,
    pub failures: Vec<StageFailure>,
    pub final_state: CycleState,
}

impl CycleReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct CycleOrchestrator<P, S> {
    config: AppConfig,
    provider: P,
    sink: S,
    portfolio: Portfolio,
    metrics: MetricsRegistry,
    overlay_sources: Vec<FeatureSource>,
    events: Option<broadcast::Sender<BotEvent>>,
    state: CycleState,
}

impl<P: MarketDataProvider, S: TradeSink> CycleOrchestrator<P, S> {
    /// Creates an orchestrator whose portfolio starts with the configured capital.
    #[must_use]
    pub fn new(config: AppConfig, provider: P, sink: S) -> Self {
        let portfolio = Portfolio::new(config.risk.capital, config.risk.max_open_positions);
        Self {
            config,
            provider,
            sink,
            portfolio,
            metrics: MetricsRegistry::new(),
            overlay_sources: Vec::new(),
            events: None,
            state: CycleState::Idle,
        }
    }

    /// External feature sources merged with the smirk features into a
    /// sentiment overlay. With none configured, signals pass through unchanged.
    #[must_use]
    pub fn with_overlay_sources(mut self, sources: Vec<FeatureSource>) -> Self {
        self.overlay_sources = sources;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: broadcast::Sender<BotEvent>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = metrics;
        self
    }

    /// Replaces the configuration used from the next cycle on.
    ///
    /// The portfolio is kept; a new capital figure only affects sizing.
    pub fn update_config(&mut self, config: AppConfig) {
        tracing::info!(symbol = %config.symbol, mode = config.trading_mode.as_str(), "Cycle config updated");
        self.config = config;
    }

    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub const fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    #[must_use]
    pub const fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    #[must_use]
    pub const fn state(&self) -> CycleState {
        self.state
    }

    #[must_use]
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Runs one cycle and always returns to `Idle`.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let _timer = self.metrics.time("cycle_duration");
        self.metrics.inc("cycles_total");
        let mut report = CycleReport::default();

        self.transition(CycleState::FetchingData);
        let snapshots = match self.fetch().await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                self.fail(&mut report, None, &e);
                return self.finish(report);
            }
        };
        report.snapshots_fetched = snapshots.len();

        self.transition(CycleState::AnalyzingSkew);
        let engine = SkewEngine::new(self.config.analysis.moneyness_threshold);
        let mut analyzed: Vec<(&OptionsChainSnapshot, SkewResult)> = Vec::new();
        for snapshot in &snapshots {
            if let Err(e) = validate_snapshot(snapshot) {
                self.fail(&mut report, Some(snapshot.expiry_label()), &e);
                continue;
            }
            analyzed.push((snapshot, engine.compute_skew(snapshot)));
        }
        if let Some(skew) = analyzed.iter().rev().find_map(|(_, r)| r.skew) {
            self.metrics.gauge("last_skew", skew);
        }

        self.transition(CycleState::ClassifyingSentiment);
        let classifier = SentimentClassifier::new(self.config.sentiment);
        for (snapshot, skew) in &analyzed {
            let sentiment = classifier.classify(skew);
            tracing::info!(
                symbol = %sentiment.symbol,
                expiry = %snapshot.expiry_label(),
                skew = ?skew.skew,
                sentiment = %sentiment.sentiment,
                confidence = sentiment.confidence,
                "Smirk sentiment"
            );
            self.emit(BotEvent::SentimentClassified(sentiment.clone()));
            report.sentiments.push(sentiment);
        }
        let validated: Vec<OptionsChainSnapshot> =
            analyzed.iter().map(|(snapshot, _)| (*snapshot).clone()).collect();
        report.skew_results = analyzed.into_iter().map(|(_, skew)| skew).collect();

        self.transition(CycleState::GeneratingSignal);
        let generator = SignalGenerator::new(self.config.signal);
        let mut signals: Vec<TradingSignal> = report
            .sentiments
            .iter()
            .filter_map(|sentiment| generator.generate(sentiment.spot_price(), sentiment))
            .collect();
        if !signals.is_empty() && !self.overlay_sources.is_empty() {
            signals = self.apply_overlay(signals, &validated, engine);
        }
        self.metrics.inc_by("signals_total", signals.len() as f64);
        for signal in &signals {
            self.emit(BotEvent::SignalGenerated(signal.clone()));
        }
        report.signals = signals;

        let best = report
            .signals
            .iter()
            .filter(|s| s.action != SignalAction::Hold)
            .fold(None::<&TradingSignal>, |best, s| match best {
                Some(b) if b.confidence >= s.confidence => Some(b),
                _ => Some(s),
            })
            .cloned();
        if let Some(signal) = best {
            self.transition(CycleState::SizingAndRecording);
            self.size_and_record(&signal, &mut report).await;
        } else {
            tracing::debug!("No signal this cycle");
        }

        self.finish(report)
    }

    async fn fetch(&self) -> Result<Vec<OptionsChainSnapshot>, PipelineError> {
        let symbol = &self.config.underlying;
        let timeout_secs = self.config.scheduler.fetch_timeout_secs.max(1);
        let fetch = self
            .provider
            .fetch_options_chain(symbol, &self.config.expiries);

        let snapshots = match tokio::time::timeout(Duration::from_secs(timeout_secs), fetch).await {
            Ok(Ok(snapshots)) => snapshots,
            Ok(Err(e)) => return Err(PipelineError::Provider(format!("{e:#}"))),
            Err(_) => {
                return Err(PipelineError::FetchTimeout {
                    symbol: symbol.clone(),
                    timeout_secs,
                })
            }
        };

        if snapshots.is_empty() {
            return Err(PipelineError::data_unavailable(
                symbol.clone(),
                self.config.expiries.join(","),
            ));
        }
        tracing::debug!(symbol = %symbol, snapshots = snapshots.len(), "Fetched options chains");
        Ok(snapshots)
    }

    fn apply_overlay(
        &self,
        signals: Vec<TradingSignal>,
        snapshots: &[OptionsChainSnapshot],
        engine: SkewEngine,
    ) -> Vec<TradingSignal> {
        let mut providers = self.overlay_sources.clone();
        providers.push(FeatureSource::Smirk(SmirkFeatures::new(snapshots.to_vec(), engine)));
        let output = StrategyEngine::new(providers, self.config.strategy.clone()).generate_signal();
        let overlay = output.as_overlay();
        tracing::debug!(score = output.signal, features = output.features.len(), "Sentiment overlay");

        signals.iter().map(|signal| combine(signal, &overlay)).collect()
    }

    async fn size_and_record(&mut self, signal: &TradingSignal, report: &mut CycleReport) {
        let symbol = self.config.symbol.clone();
        let Some(side) = trade_side(signal.action) else {
            return;
        };

        // SELL closes positions and allocates nothing new.
        let strength = match side {
            TradeSide::Buy => signal.confidence,
            TradeSide::Sell => 0.0,
        };
        let budget = RiskBudgeter::new(self.config.risk.clone()).size_position(strength);
        let trade_quantity = self.config.scheduler.trade_quantity;

        let quantity = match side {
            TradeSide::Buy if signal.price > Decimal::ZERO => {
                trade_quantity.min(budget.allocation / signal.price)
            }
            TradeSide::Buy => Decimal::ZERO,
            TradeSide::Sell => self
                .portfolio
                .get_position(&symbol)
                .map_or(trade_quantity, |position| position.quantity),
        };
        if quantity <= Decimal::ZERO {
            tracing::info!(
                symbol = %symbol,
                allocation = %budget.allocation,
                "Risk budget allows no position; skipping trade"
            );
            return;
        }

        let mut next = self.portfolio.clone();
        if let Err(e) = next.apply(side, &symbol, signal.price, quantity) {
            let err = PipelineError::InvalidInput(format!("{e:#}"));
            self.fail(report, None, &err);
            return;
        }

        let now = Utc::now();
        let mut record = TradeRecord::executed(now, &symbol, side, signal.price, quantity)
            .with_note(format!("Signal confidence: {:.2}", signal.confidence));
        if let Some(limit) = signal.limit_price {
            record = record.with_limit_price(limit);
        }
        if self.config.trading_mode == TradingMode::Paper {
            record = record.with_execution_id(paper_execution_id(now));
        }

        match self.sink.record(&record).await {
            Ok(id) => {
                record.id = id;
                self.portfolio = next;
                self.metrics.inc("trades_recorded_total");
                self.metrics.gauge("cash", decimal_to_f64(self.portfolio.cash()));
                tracing::info!(
                    id,
                    symbol = %symbol,
                    side = side.as_str(),
                    price = %signal.price,
                    quantity = %quantity,
                    confidence = signal.confidence,
                    "Trade recorded"
                );
                self.emit(BotEvent::TradeRecorded(record.clone()));
                report.trades_recorded += 1;
                report.recorded_trade = Some(record);
            }
            Err(e) => {
                self.metrics.inc("trades_dropped_total");
                let err = PipelineError::PersistenceFailure(format!("{e:#}"));
                self.fail(report, None, &err);
            }
        }
    }

    fn fail(&self, report: &mut CycleReport, expiry: Option<String>, error: &PipelineError) {
        tracing::warn!(
            stage = %self.state,
            symbol = %self.config.underlying,
            expiry = expiry.as_deref().unwrap_or("-"),
            recoverable = error.is_recoverable(),
            error = %error,
            "Cycle stage failed"
        );
        self.metrics.inc("cycle_failures_total");
        let failure = StageFailure::new(self.state, expiry, error);
        self.emit(BotEvent::StageFailed(failure.clone()));
        report.failures.push(failure);
    }

    fn finish(&mut self, mut report: CycleReport) -> CycleReport {
        self.transition(CycleState::Idle);
        report.final_state = self.state;
        self.emit(BotEvent::CycleCompleted {
            snapshots: report.snapshots_fetched,
            signals: report.signals.len(),
            trades: report.trades_recorded,
            failures: report.failures.len(),
            timestamp: Utc::now(),
        });
        report
    }

    fn transition(&mut self, next: CycleState) {
        tracing::trace!(from = %self.state, to = %next, "Cycle transition");
        self.state = next;
    }

    fn emit(&self, event: BotEvent) {
        if let Some(tx) = &self.events {
            // No subscribers is fine.
            let _ = tx.send(event);
        }
    }
}

fn validate_snapshot(snapshot: &OptionsChainSnapshot) -> Result<(), PipelineError> {
    if !snapshot.spot_price.is_finite() || snapshot.spot_price <= 0.0 {
        return Err(PipelineError::InvalidInput(format!(
            "spot price must be positive, got {}",
            snapshot.spot_price
        )));
    }
    Ok(())
}

const fn trade_side(action: SignalAction) -> Option<TradeSide> {
    match action {
        SignalAction::Buy => Some(TradeSide::Buy),
        SignalAction::Sell => Some(TradeSide::Sell),
        SignalAction::Hold => None,
    }
}

fn paper_execution_id(at: DateTime<Utc>) -> String {
    format!("PAPER-{}", at.timestamp())
}

fn decimal_to_f64(value: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use smirk_trade_core::{OptionContract, SentimentThresholds, SignalThresholds};
    use smirk_trade_data::InMemoryTradeSink;
    use smirk_trade_signals::Sentiment;
    use smirk_trade_strategy::StaticFeatures;
    use std::collections::BTreeMap;

    // ============================================
    // Test Helpers
    // ============================================

    struct FixedProvider(Vec<OptionsChainSnapshot>);

    #[async_trait]
    impl MarketDataProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn fetch_options_chain(
            &self,
            _symbol: &str,
            _expiries: &[String],
        ) -> Result<Vec<OptionsChainSnapshot>> {
            Ok(self.0.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl MarketDataProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn fetch_options_chain(
            &self,
            _symbol: &str,
            _expiries: &[String],
        ) -> Result<Vec<OptionsChainSnapshot>> {
            anyhow::bail!("venue unreachable")
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl MarketDataProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn fetch_options_chain(
            &self,
            _symbol: &str,
            _expiries: &[String],
        ) -> Result<Vec<OptionsChainSnapshot>> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(vec![])
        }
    }

    struct FailingSink;

    #[async_trait]
    impl TradeSink for FailingSink {
        async fn record(&self, _trade: &TradeRecord) -> Result<i64> {
            anyhow::bail!("connection refused")
        }
    }

    fn expiry(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 8, 0, 0).unwrap()
    }

    /// Calls at 62000/63000 and puts at 59000/58000 around spot 60500.
    fn chain(day: u32, call_ivs: (f64, f64), put_ivs: (f64, f64)) -> OptionsChainSnapshot {
        OptionsChainSnapshot::new(
            "BTC",
            60500.0,
            expiry(day),
            vec![
                OptionContract::call(62000.0, call_ivs.0),
                OptionContract::call(63000.0, call_ivs.1),
                OptionContract::put(59000.0, put_ivs.0),
                OptionContract::put(58000.0, put_ivs.1),
            ],
        )
    }

    fn smirk_chain() -> OptionsChainSnapshot {
        chain(28, (0.70, 0.68), (0.72, 0.75))
    }

    fn bullish_chain() -> OptionsChainSnapshot {
        chain(14, (0.80, 0.80), (0.60, 0.60))
    }

    fn config(bearish_skew_diff: f64) -> AppConfig {
        let mut config = AppConfig::default();
        config.sentiment = SentimentThresholds::new(0.05, bearish_skew_diff, 0.65);
        config.signal = SignalThresholds::new(0.6, 0.6);
        config
    }

    fn orchestrator(
        config: AppConfig,
        snapshots: Vec<OptionsChainSnapshot>,
    ) -> CycleOrchestrator<FixedProvider, InMemoryTradeSink> {
        CycleOrchestrator::new(config, FixedProvider(snapshots), InMemoryTradeSink::new())
    }

    // ============================================
    // Smirk Scenario Tests
    // ============================================

    #[tokio::test]
    async fn neutral_smirk_records_nothing() {
        let mut orch = orchestrator(config(-0.05), vec![smirk_chain()]);

        let report = orch.run_cycle().await;

        assert_eq!(report.snapshots_fetched, 1);
        let skew = report.skew_results[0].skew.unwrap();
        assert!((skew - (-0.045)).abs() < 1e-9);
        assert_eq!(report.sentiments[0].sentiment, Sentiment::Neutral);
        assert!((report.sentiments[0].confidence - 0.55).abs() < 1e-9);
        assert!(report.signals.is_empty());
        assert_eq!(report.trades_recorded, 0);
        assert!(report.is_clean());
        assert_eq!(report.final_state, CycleState::Idle);
        assert!(orch.sink().is_empty());
    }

    #[tokio::test]
    async fn bearish_smirk_records_sell() {
        let mut orch = orchestrator(config(-0.04), vec![smirk_chain()]);

        let report = orch.run_cycle().await;

        assert_eq!(report.sentiments[0].sentiment, Sentiment::Bearish);
        assert!((report.sentiments[0].confidence - 0.66).abs() < 1e-9);
        assert_eq!(report.signals.len(), 1);
        assert_eq!(report.signals[0].action, SignalAction::Sell);
        assert_eq!(report.signals[0].price, dec!(60500));

        let trade = report.recorded_trade.unwrap();
        assert_eq!(trade.id, 1);
        assert_eq!(trade.trade_type, "SELL");
        assert_eq!(trade.status, "EXECUTED");
        assert_eq!(trade.quantity, dec!(1));
        assert_eq!(trade.note.as_deref(), Some("Signal confidence: 0.66"));
        assert!(trade.execution_id.unwrap().starts_with("PAPER-"));
        assert_eq!(orch.portfolio().cash(), dec!(160500));
    }

    #[tokio::test]
    async fn bullish_buy_is_capped_by_budget() {
        let mut cfg = config(-0.05);
        cfg.scheduler.trade_quantity = dec!(5);
        let mut orch = orchestrator(cfg, vec![bullish_chain()]);

        let report = orch.run_cycle().await;

        let trade = report.recorded_trade.unwrap();
        assert_eq!(trade.trade_type, "BUY");
        assert!(trade.quantity > Decimal::ZERO && trade.quantity < dec!(5));
        let budget = RiskBudgeter::new(orch.config().risk.clone()).size_position(0.95);
        assert!(trade.notional() <= budget.allocation + dec!(0.000001));
        assert_eq!(orch.portfolio().open_positions(), 1);
    }

    #[tokio::test]
    async fn highest_confidence_signal_wins() {
        let mut orch = orchestrator(config(-0.04), vec![smirk_chain(), bullish_chain()]);

        let report = orch.run_cycle().await;

        assert_eq!(report.signals.len(), 2);
        assert_eq!(report.trades_recorded, 1);
        assert_eq!(report.recorded_trade.unwrap().trade_type, "BUY");
    }

    #[tokio::test]
    async fn live_mode_has_no_paper_execution_id() {
        let mut cfg = config(-0.04);
        cfg.trading_mode = TradingMode::Live;
        let mut orch = orchestrator(cfg, vec![smirk_chain()]);

        let report = orch.run_cycle().await;
        assert!(report.recorded_trade.unwrap().execution_id.is_none());
    }

    // ============================================
    // Failure Isolation Tests
    // ============================================

    #[tokio::test]
    async fn provider_error_degrades_to_no_data() {
        let mut orch = CycleOrchestrator::new(config(-0.04), FailingProvider, InMemoryTradeSink::new());

        let report = orch.run_cycle().await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, CycleState::FetchingData);
        assert!(report.failures[0].message.contains("venue unreachable"));
        assert_eq!(report.final_state, CycleState::Idle);
        assert_eq!(orch.state(), CycleState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_times_out() {
        let mut cfg = config(-0.04);
        cfg.scheduler.fetch_timeout_secs = 5;
        let mut orch = CycleOrchestrator::new(cfg, SlowProvider, InMemoryTradeSink::new());

        let report = orch.run_cycle().await;

        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].message.contains("timed out after 5s"));
    }

    #[tokio::test]
    async fn empty_fetch_is_data_unavailable() {
        let mut orch = orchestrator(config(-0.04), vec![]);

        let report = orch.run_cycle().await;

        assert_eq!(report.snapshots_fetched, 0);
        assert!(report.failures[0].message.starts_with("no market data"));
    }

    #[tokio::test]
    async fn bad_expiry_does_not_abort_siblings() {
        let mut broken = bullish_chain();
        broken.spot_price = 0.0;
        let mut orch = orchestrator(config(-0.04), vec![broken, smirk_chain()]);

        let report = orch.run_cycle().await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, CycleState::AnalyzingSkew);
        assert_eq!(report.failures[0].expiry.as_deref(), Some("2024-06-14"));
        assert_eq!(report.sentiments.len(), 1);
        assert_eq!(report.trades_recorded, 1);
    }

    #[tokio::test]
    async fn sink_failure_drops_intent_and_keeps_portfolio() {
        let mut orch =
            CycleOrchestrator::new(config(-0.04), FixedProvider(vec![smirk_chain()]), FailingSink);

        let report = orch.run_cycle().await;

        assert_eq!(report.signals.len(), 1);
        assert_eq!(report.trades_recorded, 0);
        assert!(report.recorded_trade.is_none());
        assert_eq!(report.failures[0].stage, CycleState::SizingAndRecording);
        assert!(report.failures[0].message.starts_with("persistence failure"));
        assert_eq!(orch.portfolio().cash(), dec!(100000));
        assert_eq!(orch.metrics().snapshot().counter("trades_dropped_total"), 1.0);
    }

    #[tokio::test]
    async fn rejected_buy_is_not_recorded() {
        let mut cfg = config(-0.05);
        cfg.risk.max_open_positions = 0;
        let mut orch = orchestrator(cfg, vec![bullish_chain()]);

        let report = orch.run_cycle().await;

        assert_eq!(report.trades_recorded, 0);
        assert_eq!(report.failures.len(), 1);
        assert!(orch.sink().is_empty());
    }

    // ============================================
    // Overlay / Observability Tests
    // ============================================

    #[tokio::test]
    async fn overlay_sources_merge_into_signal() {
        let mut cfg = config(-0.05);
        cfg.strategy.risk_aversion = 0.0;
        cfg.strategy.min_signal_strength = 0.0;
        let news = StaticFeatures::new("news", BTreeMap::from([("score".to_string(), 5.0)]));
        let mut orch = orchestrator(cfg, vec![bullish_chain()])
            .with_overlay_sources(vec![FeatureSource::Static(news)]);

        let report = orch.run_cycle().await;

        assert_eq!(report.signals.len(), 1);
        assert!(report.signals[0].source.ends_with("_with_sentiment"));
    }

    #[tokio::test]
    async fn rejected_snapshot_stays_out_of_overlay() {
        let overlay_run = |chains: Vec<OptionsChainSnapshot>| {
            let mut cfg = config(-0.04);
            cfg.strategy.min_signal_strength = 0.0;
            let news = StaticFeatures::new("news", BTreeMap::from([("score".to_string(), 1.0)]));
            orchestrator(cfg, chains).with_overlay_sources(vec![FeatureSource::Static(news)])
        };
        let mut broken = chain(21, (0.90, 0.90), (0.40, 0.40));
        broken.spot_price = 0.0;

        let clean = overlay_run(vec![smirk_chain()]).run_cycle().await;
        let mixed = overlay_run(vec![broken, smirk_chain()]).run_cycle().await;

        assert_eq!(mixed.failures.len(), 1);
        assert_eq!(mixed.failures[0].stage, CycleState::AnalyzingSkew);
        assert_eq!(clean.signals.len(), 1);
        assert_eq!(mixed.signals.len(), 1);
        assert_eq!(mixed.signals[0].action, clean.signals[0].action);
        assert!((mixed.signals[0].confidence - clean.signals[0].confidence).abs() < 1e-12);
        assert_eq!(
            mixed.recorded_trade.map(|t| t.note),
            clean.recorded_trade.map(|t| t.note)
        );
    }

    #[tokio::test]
    async fn metrics_and_events_track_the_cycle() {
        let (tx, mut rx) = broadcast::channel(32);
        let mut orch = orchestrator(config(-0.04), vec![smirk_chain()]).with_events(tx);

        orch.run_cycle().await;

        let snapshot = orch.metrics().snapshot();
        assert_eq!(snapshot.counter("cycles_total"), 1.0);
        assert_eq!(snapshot.counter("signals_total"), 1.0);
        assert_eq!(snapshot.counter("trades_recorded_total"), 1.0);
        assert!((snapshot.gauges["last_skew"] - (-0.045)).abs() < 1e-9);
        assert!(snapshot.timers.contains_key("cycle_duration"));

        let mut saw_trade = false;
        let mut saw_completion = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                BotEvent::TradeRecorded(trade) => saw_trade = trade.id == 1,
                BotEvent::CycleCompleted { trades, .. } => saw_completion = trades == 1,
                _ => {}
            }
        }
        assert!(saw_trade);
        assert!(saw_completion);
    }

    #[tokio::test]
    async fn config_update_applies_next_cycle() {
        let mut orch = orchestrator(config(-0.05), vec![smirk_chain()]);
        assert!(orch.run_cycle().await.signals.is_empty());

        orch.update_config(config(-0.04));
        assert_eq!(orch.run_cycle().await.signals.len(), 1);
    }
}
