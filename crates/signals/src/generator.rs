//! Confidence-gated conversion of a sentiment read into a trading signal.

use crate::sentiment::{Sentiment, SentimentResult};
use rust_decimal::Decimal;
use smirk_trade_core::{SignalAction, SignalThresholds, TradingSignal};

/// Provenance tag stamped on every smirk-derived signal.
pub const SIGNAL_SOURCE: &str = "volatility_smirk_strategy";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SignalGenerator {
    thresholds: SignalThresholds,
}

impl SignalGenerator {
    #[must_use]
    pub const fn new(thresholds: SignalThresholds) -> Self {
        Self { thresholds }
    }

    /// Emits BUY for a confident bullish read and SELL for a confident
    /// bearish one. Neutral or under-threshold reads emit nothing.
    ///
    /// The signal price is the spot used during analysis.
    #[must_use]
    pub fn generate(&self, spot_price: f64, sentiment: &SentimentResult) -> Option<TradingSignal> {
        let action = match sentiment.sentiment {
            Sentiment::Bullish if sentiment.confidence >= self.thresholds.bullish_confidence_min => {
                SignalAction::Buy
            }
            Sentiment::Bearish if sentiment.confidence >= self.thresholds.bearish_confidence_min => {
                SignalAction::Sell
            }
            _ => {
                tracing::debug!(
                    symbol = %sentiment.symbol,
                    sentiment = %sentiment.sentiment,
                    confidence = sentiment.confidence,
                    "No signal: sentiment below threshold"
                );
                return None;
            }
        };

        let price = Decimal::try_from(spot_price).unwrap_or(Decimal::ZERO);
        match TradingSignal::new(
            sentiment.timestamp,
            price,
            action,
            sentiment.confidence,
            SIGNAL_SOURCE,
        ) {
            Ok(signal) => {
                tracing::info!(
                    symbol = %sentiment.symbol,
                    action = action.as_str(),
                    confidence = signal.confidence,
                    price = %signal.price,
                    "Generated trading signal"
                );
                Some(signal)
            }
            Err(e) => {
                tracing::warn!(symbol = %sentiment.symbol, error = %e, "Discarded invalid signal");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::SentimentDetails;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn sentiment(label: Sentiment, confidence: f64) -> SentimentResult {
        SentimentResult {
            symbol: "BTC".to_string(),
            expiry: Utc.with_ymd_and_hms(2024, 6, 28, 8, 0, 0).unwrap(),
            sentiment: label,
            confidence,
            timestamp: Utc::now(),
            details: SentimentDetails {
                skew: Some(-0.045),
                avg_otm_call_iv: Some(0.69),
                avg_otm_put_iv: Some(0.735),
                num_otm_calls: 2,
                num_otm_puts: 2,
                spot_price_at_analysis: 60500.0,
                sparse: false,
            },
        }
    }

    #[test]
    fn bullish_above_threshold_buys() {
        let signal = SignalGenerator::default()
            .generate(60500.0, &sentiment(Sentiment::Bullish, 0.8))
            .unwrap();

        assert_eq!(signal.action, SignalAction::Buy);
        assert_eq!(signal.price, dec!(60500));
        assert_eq!(signal.confidence, 0.8);
        assert_eq!(signal.source, SIGNAL_SOURCE);
        assert!(signal.limit_price.is_none());
    }

    #[test]
    fn bearish_at_threshold_sells() {
        let generator = SignalGenerator::new(SignalThresholds::new(0.7, 0.6));
        let signal = generator
            .generate(60500.0, &sentiment(Sentiment::Bearish, 0.66))
            .unwrap();

        assert_eq!(signal.action, SignalAction::Sell);
        assert_eq!(signal.confidence, 0.66);

        let edge = generator.generate(60500.0, &sentiment(Sentiment::Bearish, 0.6));
        assert!(edge.is_some());
    }

    #[test]
    fn below_threshold_emits_nothing() {
        let generator = SignalGenerator::default();
        assert!(generator.generate(60500.0, &sentiment(Sentiment::Bullish, 0.69)).is_none());
        assert!(generator.generate(60500.0, &sentiment(Sentiment::Bearish, 0.66)).is_none());
    }

    #[test]
    fn neutral_never_emits() {
        let generator = SignalGenerator::new(SignalThresholds::new(0.0, 0.0));
        assert!(generator.generate(60500.0, &sentiment(Sentiment::Neutral, 0.95)).is_none());
    }

    #[test]
    fn sides_use_their_own_threshold() {
        let generator = SignalGenerator::new(SignalThresholds::new(0.9, 0.5));
        assert!(generator.generate(1.0, &sentiment(Sentiment::Bullish, 0.8)).is_none());
        assert!(generator.generate(1.0, &sentiment(Sentiment::Bearish, 0.8)).is_some());
    }
}
