//! Event-log replay.
//!
//! Options-chain events move the exposure through a caller-supplied
//! pipeline; price bars realize `exposure * close-to-close return` on the
//! equity curve. Exposure mirrors the long-only paper portfolio: a BUY goes
//! fully long, a SELL goes flat, and no signal leaves it unchanged.

use crate::metrics::{bar_return, EquityCurve};
use anyhow::{Context, Result};
use smirk_trade_core::{AppConfig, MarketDataEvent, OptionsChainSnapshot, PriceBar, SignalAction};
use smirk_trade_signals::{SentimentClassifier, SignalGenerator, SkewEngine};
use std::path::Path;

pub struct ReplayEngine<F> {
    pipeline: F,
    exposure: f64,
    last_bar: Option<PriceBar>,
    curve: EquityCurve,
    chains_seen: usize,
}

impl<F> ReplayEngine<F>
where
    F: FnMut(&OptionsChainSnapshot) -> Option<f64>,
{
    /// `pipeline` maps a chain to a target exposure, or `None` to hold.
    #[must_use]
    pub fn new(pipeline: F) -> Self {
        Self {
            pipeline,
            exposure: 0.0,
            last_bar: None,
            curve: EquityCurve::new(),
            chains_seen: 0,
        }
    }

    pub fn process(&mut self, event: &MarketDataEvent) {
        match event {
            MarketDataEvent::OptionsChain(chain) => {
                self.chains_seen += 1;
                if let Some(target) = (self.pipeline)(chain) {
                    if target.is_finite() {
                        self.exposure = target.clamp(-1.0, 1.0);
                    } else {
                        tracing::warn!(symbol = %chain.symbol, "Ignoring non-finite exposure");
                    }
                }
            }
            MarketDataEvent::Bar(bar) => {
                let ret = self.exposure * bar_return(self.last_bar.as_ref(), bar);
                self.curve.push(bar.timestamp, ret);
                self.last_bar = Some(bar.clone());
            }
        }
    }

    /// Replays every event in order and returns the resulting curve.
    pub fn run<'a, I>(mut self, events: I) -> EquityCurve
    where
        I: IntoIterator<Item = &'a MarketDataEvent>,
    {
        for event in events {
            self.process(event);
        }
        tracing::info!(
            chains = self.chains_seen,
            bars = self.curve.len(),
            final_equity = self.curve.last_equity(),
            "Replay finished"
        );
        self.curve
    }

    #[must_use]
    pub const fn exposure(&self) -> f64 {
        self.exposure
    }

    #[must_use]
    pub const fn curve(&self) -> &EquityCurve {
        &self.curve
    }
}

/// The smirk pipeline used by live cycles, as a replay exposure function.
pub fn smirk_pipeline(config: &AppConfig) -> impl FnMut(&OptionsChainSnapshot) -> Option<f64> {
    let engine = SkewEngine::new(config.analysis.moneyness_threshold);
    let classifier = SentimentClassifier::new(config.sentiment);
    let generator = SignalGenerator::new(config.signal);

    move |chain| {
        let sentiment = classifier.classify(&engine.compute_skew(chain));
        let signal = generator.generate(chain.spot_price, &sentiment)?;
        match signal.action {
            SignalAction::Buy => Some(1.0),
            SignalAction::Sell => Some(0.0),
            SignalAction::Hold => None,
        }
    }
}

/// Reads a JSON-lines event log. Blank lines are skipped.
///
/// # Errors
/// Returns an error naming the line if the file cannot be read or a line
/// does not parse as a [`MarketDataEvent`].
pub fn read_event_log(path: &Path) -> Result<Vec<MarketDataEvent>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read event log {}", path.display()))?;

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Invalid event on line {} of {}", i + 1, path.display()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use smirk_trade_core::{OptionContract, SentimentThresholds, SignalThresholds};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    fn bar(n: i64, close: i64) -> MarketDataEvent {
        let close = Decimal::from(close);
        MarketDataEvent::Bar(PriceBar {
            symbol: "BTC".to_string(),
            timestamp: day(n),
            open: close,
            high: close,
            low: close,
            close,
            volume: Decimal::ONE,
        })
    }

    fn chain(call_iv: f64, put_iv: f64) -> MarketDataEvent {
        MarketDataEvent::OptionsChain(OptionsChainSnapshot::new(
            "BTC",
            60500.0,
            day(30),
            vec![
                OptionContract::call(62000.0, call_iv),
                OptionContract::call(63000.0, call_iv),
                OptionContract::put(59000.0, put_iv),
                OptionContract::put(58000.0, put_iv),
            ],
        ))
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.sentiment = SentimentThresholds::new(0.05, -0.05, 0.65);
        config.signal = SignalThresholds::new(0.6, 0.6);
        config
    }

    // ============================================
    // Replay Tests
    // ============================================

    #[test]
    fn bars_before_any_signal_are_flat() {
        let events = vec![bar(0, 100), bar(1, 120)];
        let curve = ReplayEngine::new(|_: &OptionsChainSnapshot| Some(1.0)).run(&events);

        assert_eq!(curve.len(), 2);
        assert!((curve.last_equity() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn exposure_applies_to_following_bars() {
        let events = vec![bar(0, 100), chain(0.8, 0.6), bar(1, 110), bar(2, 121)];
        let curve = ReplayEngine::new(|_: &OptionsChainSnapshot| Some(0.5)).run(&events);

        assert!((curve.last_equity() - 1.05 * 1.05).abs() < 1e-12);
    }

    #[test]
    fn none_holds_and_targets_are_clamped() {
        let mut targets = vec![Some(3.0), None].into_iter();
        let mut engine = ReplayEngine::new(move |_: &OptionsChainSnapshot| targets.next().flatten());

        engine.process(&chain(0.7, 0.7));
        assert_eq!(engine.exposure(), 1.0);
        engine.process(&chain(0.7, 0.7));
        assert_eq!(engine.exposure(), 1.0);
    }

    #[test]
    fn smirk_pipeline_goes_long_then_flat() {
        let mut pipeline = smirk_pipeline(&config());

        assert_eq!(pipeline(&chain_snapshot(0.80, 0.60)), Some(1.0));
        assert_eq!(pipeline(&chain_snapshot(0.60, 0.80)), Some(0.0));
        assert_eq!(pipeline(&chain_snapshot(0.70, 0.70)), None);
    }

    fn chain_snapshot(call_iv: f64, put_iv: f64) -> OptionsChainSnapshot {
        match chain(call_iv, put_iv) {
            MarketDataEvent::OptionsChain(snapshot) => snapshot,
            MarketDataEvent::Bar(_) => unreachable!(),
        }
    }

    #[test]
    fn smirk_replay_end_to_end() {
        let events = vec![
            bar(0, 100),
            chain(0.80, 0.60),
            bar(1, 110),
            chain(0.60, 0.80),
            bar(2, 90),
        ];
        let curve = ReplayEngine::new(smirk_pipeline(&config())).run(&events);

        assert!((curve.last_equity() - 1.1).abs() < 1e-12);
    }

    // ============================================
    // Event Log Tests
    // ============================================

    #[test]
    fn reads_json_lines_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let lines: Vec<String> = [bar(0, 100), chain(0.8, 0.6)]
            .iter()
            .map(|e| serde_json::to_string(e).unwrap())
            .collect();
        std::fs::write(&path, format!("{}\n\n{}\n", lines[0], lines[1])).unwrap();

        let events = read_event_log(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], MarketDataEvent::OptionsChain(_)));
    }

    #[test]
    fn bad_line_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        std::fs::write(&path, "{\"type\":\"bar\"}\n").unwrap();

        let err = read_event_log(&path).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
