//! Out-of-the-money implied-volatility skew.
//!
//! Contracts are bucketed by moneyness relative to spot:
//! - OTM call: `strike > spot * (1 + threshold)`
//! - OTM put:  `strike < spot * (1 - threshold)`
//!
//! The skew metric is `mean(call IV) - mean(put IV)`. When only one bucket
//! has data, a fixed `+0.1` (calls) or `-0.1` (puts) stands in for the
//! missing comparison. With no data on either side the metric is undefined.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smirk_trade_core::{OptionKind, OptionsChainSnapshot};

/// Skew reported when only OTM calls carry a usable IV.
pub const CALLS_ONLY_SKEW: f64 = 0.1;

/// Skew reported when only OTM puts carry a usable IV.
pub const PUTS_ONLY_SKEW: f64 = -0.1;

/// Default distance from spot beyond which a strike is OTM.
pub const DEFAULT_MONEYNESS_THRESHOLD: f64 = 0.02;

/// Result of analysing one options chain snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkewResult {
    pub symbol: String,
    pub expiry: DateTime<Utc>,
    /// `None` when neither bucket holds a valid IV.
    pub skew: Option<f64>,
    pub avg_otm_call_iv: Option<f64>,
    pub avg_otm_put_iv: Option<f64>,
    pub num_otm_calls: usize,
    pub num_otm_puts: usize,
    pub spot_price: f64,
    pub moneyness_threshold: f64,
}

impl SkewResult {
    /// True when exactly one bucket is populated and the metric is a stand-in.
    #[must_use]
    pub const fn is_sparse(&self) -> bool {
        (self.num_otm_calls == 0) != (self.num_otm_puts == 0)
    }

    #[must_use]
    pub const fn is_defined(&self) -> bool {
        self.skew.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkewEngine {
    moneyness_threshold: f64,
}

impl Default for SkewEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MONEYNESS_THRESHOLD)
    }
}

impl SkewEngine {
    /// Creates an engine; a negative or non-finite threshold falls back to 0.
    #[must_use]
    pub fn new(moneyness_threshold: f64) -> Self {
        let moneyness_threshold = if moneyness_threshold.is_finite() {
            moneyness_threshold.max(0.0)
        } else {
            0.0
        };
        Self { moneyness_threshold }
    }

    #[must_use]
    pub const fn moneyness_threshold(&self) -> f64 {
        self.moneyness_threshold
    }

    #[must_use]
    pub fn compute_skew(&self, snapshot: &OptionsChainSnapshot) -> SkewResult {
        let spot = snapshot.spot_price;
        let call_floor = spot * (1.0 + self.moneyness_threshold);
        let put_ceiling = spot * (1.0 - self.moneyness_threshold);

        let mut call_ivs = Vec::new();
        let mut put_ivs = Vec::new();
        for contract in &snapshot.contracts {
            let Some(iv) = contract.valid_iv() else {
                continue;
            };
            match contract.kind {
                OptionKind::Call if contract.strike > call_floor => call_ivs.push(iv),
                OptionKind::Put if contract.strike < put_ceiling => put_ivs.push(iv),
                _ => {}
            }
        }

        let avg_otm_call_iv = mean(&call_ivs);
        let avg_otm_put_iv = mean(&put_ivs);
        let skew = match (avg_otm_call_iv, avg_otm_put_iv) {
            (Some(call), Some(put)) => Some(call - put),
            (Some(_), None) => Some(CALLS_ONLY_SKEW),
            (None, Some(_)) => Some(PUTS_ONLY_SKEW),
            (None, None) => None,
        };

        tracing::debug!(
            symbol = %snapshot.symbol,
            expiry = %snapshot.expiry_label(),
            otm_calls = call_ivs.len(),
            otm_puts = put_ivs.len(),
            skew = ?skew,
            "Computed volatility skew"
        );

        SkewResult {
            symbol: snapshot.symbol.clone(),
            expiry: snapshot.expiry,
            skew,
            avg_otm_call_iv,
            avg_otm_put_iv,
            num_otm_calls: call_ivs.len(),
            num_otm_puts: put_ivs.len(),
            spot_price: spot,
            moneyness_threshold: self.moneyness_threshold,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use smirk_trade_core::OptionContract;

    // ============================================
    // Test Helpers
    // ============================================

    fn snapshot(contracts: Vec<OptionContract>) -> OptionsChainSnapshot {
        OptionsChainSnapshot::new(
            "BTC",
            60500.0,
            Utc.with_ymd_and_hms(2024, 6, 28, 8, 0, 0).unwrap(),
            contracts,
        )
    }

    // ============================================
    // Bucket Tests
    // ============================================

    #[test]
    fn empty_chain_is_undefined() {
        let result = SkewEngine::default().compute_skew(&snapshot(vec![]));

        assert_eq!(result.skew, None);
        assert_eq!(result.num_otm_calls, 0);
        assert_eq!(result.num_otm_puts, 0);
        assert!(!result.is_sparse());
    }

    #[test]
    fn skew_is_call_mean_minus_put_mean() {
        let result = SkewEngine::default().compute_skew(&snapshot(vec![
            OptionContract::call(62000.0, 0.70),
            OptionContract::call(63000.0, 0.68),
            OptionContract::put(59000.0, 0.72),
            OptionContract::put(58000.0, 0.75),
        ]));

        assert_eq!(result.num_otm_calls, 2);
        assert_eq!(result.num_otm_puts, 2);
        assert!((result.avg_otm_call_iv.unwrap() - 0.69).abs() < 1e-12);
        assert!((result.avg_otm_put_iv.unwrap() - 0.735).abs() < 1e-12);
        assert!((result.skew.unwrap() + 0.045).abs() < 1e-12);
        assert!(!result.is_sparse());
    }

    #[test]
    fn near_the_money_contracts_are_excluded() {
        // 2% band around 60500 is (59290, 61710)
        let result = SkewEngine::default().compute_skew(&snapshot(vec![
            OptionContract::call(60000.0, 0.70),
            OptionContract::call(61000.0, 0.68),
            OptionContract::put(59500.0, 0.72),
        ]));

        assert_eq!(result.skew, None);
        assert_eq!(result.num_otm_calls, 0);
        assert_eq!(result.num_otm_puts, 0);
    }

    #[test]
    fn itm_contracts_are_excluded() {
        // deep ITM call and ITM put never count as OTM
        let result = SkewEngine::default().compute_skew(&snapshot(vec![
            OptionContract::call(50000.0, 0.9),
            OptionContract::put(70000.0, 0.9),
        ]));
        assert_eq!(result.skew, None);
    }

    #[test]
    fn invalid_ivs_are_discarded() {
        let result = SkewEngine::default().compute_skew(&snapshot(vec![
            OptionContract::call(65000.0, 0.0),
            OptionContract::call(66000.0, -0.2),
            OptionContract::call(67000.0, f64::NAN),
            OptionContract::new(68000.0, OptionKind::Call, None),
            OptionContract::put(55000.0, 0.8),
        ]));

        assert_eq!(result.num_otm_calls, 0);
        assert_eq!(result.num_otm_puts, 1);
        assert_eq!(result.skew, Some(PUTS_ONLY_SKEW));
    }

    // ============================================
    // Sparse Data Tests
    // ============================================

    #[test]
    fn calls_only_is_fixed_positive() {
        let result = SkewEngine::default().compute_skew(&snapshot(vec![
            OptionContract::call(65000.0, 0.6),
            OptionContract::call(70000.0, 0.9),
        ]));

        assert_eq!(result.skew, Some(0.1));
        assert!(result.is_sparse());
        assert_eq!(result.avg_otm_put_iv, None);
    }

    #[test]
    fn puts_only_is_fixed_negative() {
        let result = SkewEngine::default()
            .compute_skew(&snapshot(vec![OptionContract::put(50000.0, 0.8)]));

        assert_eq!(result.skew, Some(-0.1));
        assert!(result.is_sparse());
    }

    // ============================================
    // Threshold Tests
    // ============================================

    #[test]
    fn zero_threshold_counts_any_strike_beyond_spot() {
        let result = SkewEngine::new(0.0).compute_skew(&snapshot(vec![
            OptionContract::call(60501.0, 0.5),
            OptionContract::put(60499.0, 0.65),
        ]));

        assert_eq!(result.num_otm_calls, 1);
        assert_eq!(result.num_otm_puts, 1);
        assert!((result.skew.unwrap() + 0.15).abs() < 1e-12);
    }

    #[test]
    fn negative_threshold_is_floored() {
        assert_eq!(SkewEngine::new(-0.5).moneyness_threshold(), 0.0);
        assert_eq!(SkewEngine::new(f64::NAN).moneyness_threshold(), 0.0);
    }

    #[test]
    fn result_carries_snapshot_context() {
        let snap = snapshot(vec![]);
        let result = SkewEngine::new(0.05).compute_skew(&snap);

        assert_eq!(result.symbol, "BTC");
        assert_eq!(result.expiry, snap.expiry);
        assert_eq!(result.spot_price, 60500.0);
        assert_eq!(result.moneyness_threshold, 0.05);
    }
}
