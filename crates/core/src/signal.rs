//! Trading signal types and the pure overlay merge.
//!
//! A [`TradingSignal`] is produced once per sentiment read and is never
//! mutated afterwards; later stages derive new signals from it.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Directional decision carried by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl SignalAction {
    /// Returns the numeric encoding: `+1` buy, `-1` sell, `0` hold.
    #[must_use]
    pub const fn as_i8(self) -> i8 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
            Self::Hold => 0,
        }
    }

    /// Decodes the numeric encoding; any other value is `None`.
    #[must_use]
    pub const fn from_i8(value: i8) -> Option<Self> {
        match value {
            1 => Some(Self::Buy),
            -1 => Some(Self::Sell),
            0 => Some(Self::Hold),
            _ => None,
        }
    }

    /// Maps the sign of a score onto an action.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score > 0.0 {
            Self::Buy
        } else if score < 0.0 {
            Self::Sell
        } else {
            Self::Hold
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
        }
    }
}

/// A directional trading decision with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub timestamp: DateTime<Utc>,
    /// Reference price the decision was made against.
    pub price: Decimal,
    pub action: SignalAction,
    /// Confidence from 0.0 to 1.0.
    pub confidence: f64,
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    /// Tag identifying the producing strategy.
    pub source: String,
}

impl TradingSignal {
    /// Creates a new signal with validation.
    ///
    /// # Errors
    /// Returns error if confidence is outside [0.0, 1.0] or the price is negative.
    pub fn new(
        timestamp: DateTime<Utc>,
        price: Decimal,
        action: SignalAction,
        confidence: f64,
        source: impl Into<String>,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&confidence) {
            anyhow::bail!("confidence must be in [0.0, 1.0], got {confidence}");
        }
        if price < Decimal::ZERO {
            anyhow::bail!("price must be non-negative, got {price}");
        }
        Ok(Self {
            timestamp,
            price,
            action,
            confidence,
            limit_price: None,
            source: source.into(),
        })
    }

    #[must_use]
    pub const fn with_limit_price(mut self, limit_price: Decimal) -> Self {
        self.limit_price = Some(limit_price);
        self
    }

    /// Returns the numeric encoding of the action.
    #[must_use]
    pub const fn signal(&self) -> i8 {
        self.action.as_i8()
    }
}

/// A second opinion applied on top of a signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalOverlay {
    /// Directional score in [-1, 1].
    pub signal: f64,
    /// Confidence from 0.0 to 1.0.
    pub confidence: f64,
    pub source: String,
}

impl SignalOverlay {
    #[must_use]
    pub fn new(signal: f64, confidence: f64, source: impl Into<String>) -> Self {
        Self {
            signal: signal.clamp(-1.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            source: source.into(),
        }
    }
}

const OVERLAY_CONFIDENCE_CEILING: f64 = 0.95;
const OVERLAY_CONFIDENCE_FLOOR: f64 = 0.5;
const OVERLAY_STEP: f64 = 0.1;
const OVERLAY_FLIP_THRESHOLD: f64 = 0.7;

/// Merges an overlay into a signal, returning a new signal.
///
/// Agreement boosts confidence (capped at 0.95). Strong disagreement
/// (`|signal| > 0.7` and confidence above 0.7) flips the action and adopts the
/// overlay confidence. Mild disagreement lowers confidence, never below 0.5.
/// A flat overlay leaves the signal untouched.
#[must_use]
pub fn combine(signal: &TradingSignal, overlay: &SignalOverlay) -> TradingSignal {
    let own = f64::from(signal.action.as_i8());
    let theirs = overlay.signal;

    if theirs == 0.0 {
        return signal.clone();
    }

    let mut merged = signal.clone();
    if (own > 0.0 && theirs > 0.0) || (own < 0.0 && theirs < 0.0) {
        merged.confidence =
            (signal.confidence + OVERLAY_STEP * overlay.confidence).min(OVERLAY_CONFIDENCE_CEILING);
    } else if theirs.abs() > OVERLAY_FLIP_THRESHOLD && overlay.confidence > OVERLAY_FLIP_THRESHOLD {
        merged.action = SignalAction::from_score(theirs);
        merged.confidence = overlay.confidence;
    } else {
        merged.confidence =
            (signal.confidence - OVERLAY_STEP * overlay.confidence).max(OVERLAY_CONFIDENCE_FLOOR);
    }
    merged.source = format!("{}_with_sentiment", signal.source);
    merged
}

/// A named source of numeric features for the strategy ensemble.
pub trait FeatureProvider {
    /// Returns the provider name used for ensemble weighting.
    fn name(&self) -> &str;

    /// Computes the provider's current features.
    ///
    /// # Errors
    /// Returns an error if the features cannot be computed; callers treat
    /// that as an empty feature set.
    fn compute(&self) -> Result<BTreeMap<String, f64>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sell(confidence: f64) -> TradingSignal {
        TradingSignal::new(
            Utc::now(),
            dec!(60500),
            SignalAction::Sell,
            confidence,
            "volatility_smirk_strategy",
        )
        .unwrap()
    }

    // ============================================
    // SignalAction
    // ============================================

    #[test]
    fn action_encoding_round_trips() {
        for action in [SignalAction::Buy, SignalAction::Sell, SignalAction::Hold] {
            assert_eq!(SignalAction::from_i8(action.as_i8()), Some(action));
        }
        assert_eq!(SignalAction::from_i8(2), None);
    }

    #[test]
    fn action_from_score_uses_sign() {
        assert_eq!(SignalAction::from_score(0.3), SignalAction::Buy);
        assert_eq!(SignalAction::from_score(-0.01), SignalAction::Sell);
        assert_eq!(SignalAction::from_score(0.0), SignalAction::Hold);
    }

    // ============================================
    // TradingSignal
    // ============================================

    #[test]
    fn signal_rejects_confidence_above_one() {
        let result = TradingSignal::new(Utc::now(), dec!(1), SignalAction::Buy, 1.2, "x");
        assert!(result.is_err());
    }

    #[test]
    fn signal_rejects_negative_price() {
        let result = TradingSignal::new(Utc::now(), dec!(-1), SignalAction::Buy, 0.5, "x");
        assert!(result.is_err());
    }

    #[test]
    fn signal_serializes_action_uppercase() {
        let json = serde_json::to_value(sell(0.66)).unwrap();
        assert_eq!(json["action"], "SELL");
        assert!(json["limit_price"].is_null());
    }

    // ============================================
    // combine
    // ============================================

    #[test]
    fn combine_agreement_boosts_confidence() {
        let base = sell(0.66);
        let merged = combine(&base, &SignalOverlay::new(-0.4, 0.5, "news"));

        assert_eq!(merged.action, SignalAction::Sell);
        assert!((merged.confidence - 0.71).abs() < 1e-9);
        assert_eq!(merged.source, "volatility_smirk_strategy_with_sentiment");
    }

    #[test]
    fn combine_agreement_is_capped() {
        let merged = combine(&sell(0.93), &SignalOverlay::new(-1.0, 1.0, "news"));
        assert!((merged.confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn combine_strong_disagreement_flips() {
        let merged = combine(&sell(0.66), &SignalOverlay::new(0.8, 0.9, "news"));

        assert_eq!(merged.action, SignalAction::Buy);
        assert!((merged.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn combine_mild_disagreement_reduces_with_floor() {
        let merged = combine(&sell(0.66), &SignalOverlay::new(0.3, 0.6, "news"));
        assert_eq!(merged.action, SignalAction::Sell);
        assert!((merged.confidence - 0.6).abs() < 1e-9);

        let floored = combine(&sell(0.52), &SignalOverlay::new(0.3, 0.6, "news"));
        assert!((floored.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn combine_flat_overlay_is_identity() {
        let base = sell(0.66);
        assert_eq!(combine(&base, &SignalOverlay::new(0.0, 0.9, "news")), base);
    }

    #[test]
    fn combine_leaves_input_untouched() {
        let base = sell(0.66);
        let before = base.clone();
        let _ = combine(&base, &SignalOverlay::new(0.9, 0.9, "news"));
        assert_eq!(base, before);
    }
}
