//! Maps a skew metric onto a sentiment label and confidence.

use crate::skew::SkewResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smirk_trade_core::SentimentThresholds;

/// Hard ceiling for directional confidence.
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Confidence reported when the skew metric is undefined.
pub const INSUFFICIENT_DATA_CONFIDENCE: f64 = 0.4;

const NEUTRAL_DISCOUNT: f64 = 0.1;
const SCALE: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Analysis context carried alongside a sentiment read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentDetails {
    pub skew: Option<f64>,
    pub avg_otm_call_iv: Option<f64>,
    pub avg_otm_put_iv: Option<f64>,
    pub num_otm_calls: usize,
    pub num_otm_puts: usize,
    pub spot_price_at_analysis: f64,
    /// Only one OTM bucket had data; the skew is a fixed stand-in.
    pub sparse: bool,
}

impl From<&SkewResult> for SentimentDetails {
    fn from(result: &SkewResult) -> Self {
        Self {
            skew: result.skew,
            avg_otm_call_iv: result.avg_otm_call_iv,
            avg_otm_put_iv: result.avg_otm_put_iv,
            num_otm_calls: result.num_otm_calls,
            num_otm_puts: result.num_otm_puts,
            spot_price_at_analysis: result.spot_price,
            sparse: result.is_sparse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub symbol: String,
    pub expiry: DateTime<Utc>,
    pub sentiment: Sentiment,
    /// Confidence in [0, 1], rounded to two decimals.
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub details: SentimentDetails,
}

impl SentimentResult {
    #[must_use]
    pub const fn spot_price(&self) -> f64 {
        self.details.spot_price_at_analysis
    }
}

/// Deterministic skew-to-sentiment classifier.
///
/// | skew                        | label   | confidence                                  |
/// |-----------------------------|---------|---------------------------------------------|
/// | undefined                   | neutral | 0.4                                         |
/// | `> bullish_skew_diff`       | bullish | `min(0.95, min_conf + (s - bull) * 2)`      |
/// | `< bearish_skew_diff`       | bearish | `min(0.95, min_conf + abs(s - bear) * 2)`   |
/// | otherwise                   | neutral | `min_conf - 0.1`                            |
///
/// Every confidence is clamped to [0, 1] and rounded to two decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SentimentClassifier {
    thresholds: SentimentThresholds,
}

impl SentimentClassifier {
    #[must_use]
    pub const fn new(thresholds: SentimentThresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub const fn thresholds(&self) -> &SentimentThresholds {
        &self.thresholds
    }

    #[must_use]
    pub fn classify(&self, result: &SkewResult) -> SentimentResult {
        let t = &self.thresholds;
        let (sentiment, confidence) = match result.skew {
            None => (Sentiment::Neutral, INSUFFICIENT_DATA_CONFIDENCE),
            Some(skew) if skew > t.bullish_skew_diff => (
                Sentiment::Bullish,
                MAX_CONFIDENCE.min(t.min_confidence + (skew - t.bullish_skew_diff) * SCALE),
            ),
            Some(skew) if skew < t.bearish_skew_diff => (
                Sentiment::Bearish,
                MAX_CONFIDENCE.min(t.min_confidence + (skew - t.bearish_skew_diff).abs() * SCALE),
            ),
            Some(_) => (Sentiment::Neutral, t.min_confidence - NEUTRAL_DISCOUNT),
        };

        Self::finish(result, sentiment, confidence)
    }

    fn finish(result: &SkewResult, sentiment: Sentiment, confidence: f64) -> SentimentResult {
        let confidence = round2(confidence.clamp(0.0, 1.0));

        tracing::debug!(
            symbol = %result.symbol,
            expiry = %result.expiry.format("%Y-%m-%d"),
            skew = ?result.skew,
            sentiment = %sentiment,
            confidence,
            "Classified smirk sentiment"
        );

        SentimentResult {
            symbol: result.symbol.clone(),
            expiry: result.expiry,
            sentiment,
            confidence,
            timestamp: Utc::now(),
            details: SentimentDetails::from(result),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
