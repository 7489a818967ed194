//! Weighted ensemble of feature providers.
//!
//! Each provider's features are weighted and summed per key, squashed with
//! `tanh`, averaged, and scaled by `1 - risk_aversion`. Scores weaker than
//! `min_signal_strength` collapse to zero.

use serde::{Deserialize, Serialize};
use smirk_trade_core::{FeatureProvider, SignalOverlay, StrategyConfig};
use std::collections::BTreeMap;

/// Source tag carried by overlays derived from the ensemble.
pub const OVERLAY_SOURCE: &str = "strategy_engine";

const DEFAULT_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyOutput {
    /// Ensemble score in [-1, 1]; zero when below the strength floor.
    pub signal: f64,
    /// Weighted features the score was computed from.
    pub features: BTreeMap<String, f64>,
}

impl StrategyOutput {
    /// Converts the score into an overlay for [`smirk_trade_core::combine`].
    #[must_use]
    pub fn as_overlay(&self) -> SignalOverlay {
        SignalOverlay::new(self.signal, self.signal.abs().min(1.0), OVERLAY_SOURCE)
    }
}

pub struct StrategyEngine<P: FeatureProvider> {
    providers: Vec<P>,
    config: StrategyConfig,
}

impl<P: FeatureProvider> StrategyEngine<P> {
    #[must_use]
    pub const fn new(providers: Vec<P>, config: StrategyConfig) -> Self {
        Self { providers, config }
    }

    #[must_use]
    pub fn providers(&self) -> &[P] {
        &self.providers
    }

    #[must_use]
    pub fn generate_signal(&self) -> StrategyOutput {
        tracing::debug!(providers = self.providers.len(), "Generating ensemble signal");

        let mut combined: BTreeMap<String, f64> = BTreeMap::new();
        for provider in &self.providers {
            let features = match provider.compute() {
                Ok(features) => features,
                Err(e) => {
                    tracing::warn!(provider = provider.name(), error = %e, "Feature provider failed");
                    BTreeMap::new()
                }
            };
            let weight = self
                .config
                .ensemble_weights
                .get(provider.name())
                .copied()
                .unwrap_or(DEFAULT_WEIGHT);
            for (key, value) in features {
                *combined.entry(key).or_insert(0.0) += weight * value;
            }
        }

        let signal = self.score(&combined);
        StrategyOutput {
            signal,
            features: combined,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn score(&self, combined: &BTreeMap<String, f64>) -> f64 {
        if combined.is_empty() {
            return 0.0;
        }
        let mean = combined.values().map(|v| v.tanh()).sum::<f64>() / combined.len() as f64;
        let adjusted = mean * (1.0 - self.config.risk_aversion);
        if !adjusted.is_finite() || adjusted.abs() < self.config.min_signal_strength {
            return 0.0;
        }
        adjusted
    }
}
