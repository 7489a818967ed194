//! IV regime labelling from rolling z-scores across strikes.

use crate::sentiment::Sentiment;
use serde::{Deserialize, Serialize};
use smirk_trade_core::{OptionKind, OptionsChainSnapshot};
use std::collections::VecDeque;

/// |z| beyond which a strike's IV is considered a regime outlier.
pub const REGIME_Z_THRESHOLD: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimePoint {
    pub strike: f64,
    pub kind: OptionKind,
    pub iv: f64,
    pub rolling_mean: f64,
    /// Sample standard deviation; `None` until the window holds two values.
    pub rolling_std: Option<f64>,
    /// `None` when the rolling std is zero or undefined.
    pub z_score: Option<f64>,
    pub regime: Option<Sentiment>,
}

/// Labels each valid-IV contract, ordered by strike, against the rolling
/// statistics of the trailing `window` contracts (itself included).
///
/// `z <= -1.5` is bearish, `z > 1.5` bullish, anything between neutral.
#[must_use]
pub fn detect_regimes(snapshot: &OptionsChainSnapshot, window: usize) -> Vec<RegimePoint> {
    let window = window.max(1);
    let mut contracts: Vec<(f64, OptionKind, f64)> = snapshot
        .contracts
        .iter()
        .filter_map(|c| c.valid_iv().map(|iv| (c.strike, c.kind, iv)))
        .collect();
    contracts.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut trailing: VecDeque<f64> = VecDeque::with_capacity(window);
    contracts
        .into_iter()
        .map(|(strike, kind, iv)| {
            if trailing.len() == window {
                trailing.pop_front();
            }
            trailing.push_back(iv);

            let (rolling_mean, rolling_std) = rolling_stats(&trailing);
            let z_score = rolling_std
                .filter(|std| *std > 0.0)
                .map(|std| (iv - rolling_mean) / std);

            RegimePoint {
                strike,
                kind,
                iv,
                rolling_mean,
                rolling_std,
                z_score,
                regime: z_score.map(classify_z),
            }
        })
        .collect()
}

fn classify_z(z: f64) -> Sentiment {
    if z <= -REGIME_Z_THRESHOLD {
        Sentiment::Bearish
    } else if z > REGIME_Z_THRESHOLD {
        Sentiment::Bullish
    } else {
        Sentiment::Neutral
    }
}

#[allow(clippy::cast_precision_loss)]
fn rolling_stats(values: &VecDeque<f64>) -> (f64, Option<f64>) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, None);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, Some(variance.sqrt()))
}
