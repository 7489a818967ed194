//! Higher-order moments of the implied-volatility distribution per expiry.

use crate::skew::SkewEngine;
use serde::{Deserialize, Serialize};
use smirk_trade_core::OptionsChainSnapshot;
use std::collections::BTreeMap;

/// Sample statistics of an IV cross-section.
///
/// Skewness is the adjusted Fisher-Pearson coefficient and kurtosis is the
/// bias-corrected excess kurtosis, both as reported by pandas. A constant
/// series has zero skew and kurtosis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IvMoments {
    pub count: usize,
    pub mean: Option<f64>,
    /// Needs at least 3 observations.
    pub skew: Option<f64>,
    /// Needs at least 4 observations.
    pub kurtosis: Option<f64>,
}

impl IvMoments {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_ivs(ivs: &[f64]) -> Self {
        let values: Vec<f64> = ivs.iter().copied().filter(|v| v.is_finite()).collect();
        let count = values.len();
        if count == 0 {
            return Self::default();
        }

        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;
        let (mut s2, mut s3, mut s4) = (0.0, 0.0, 0.0);
        for v in &values {
            let d = v - mean;
            let d2 = d * d;
            s2 += d2;
            s3 += d2 * d;
            s4 += d2 * d2;
        }

        let skew = (count >= 3).then(|| {
            if s2 == 0.0 {
                return 0.0;
            }
            let m2 = s2 / n;
            let m3 = s3 / n;
            (n * (n - 1.0)).sqrt() / (n - 2.0) * m3 / m2.powf(1.5)
        });

        let kurtosis = (count >= 4).then(|| {
            if s2 == 0.0 {
                return 0.0;
            }
            let numerator = n * (n + 1.0) * (n - 1.0) * s4;
            let denominator = (n - 2.0) * (n - 3.0) * s2 * s2;
            let adjustment = 3.0 * (n - 1.0).powi(2) / ((n - 2.0) * (n - 3.0));
            numerator / denominator - adjustment
        });

        Self {
            count,
            mean: Some(mean),
            skew,
            kurtosis,
        }
    }

    #[must_use]
    pub fn from_snapshot(snapshot: &OptionsChainSnapshot) -> Self {
        let ivs: Vec<f64> = snapshot
            .contracts
            .iter()
            .filter_map(|c| c.valid_iv())
            .collect();
        Self::from_ivs(&ivs)
    }
}

/// Flattens per-expiry analytics into named features.
///
/// Keys are `<YYYY-MM-DD>_mean`, `_skew`, `_kurtosis` and `_skew_metric`.
/// Undefined values are left out rather than reported as NaN.
#[must_use]
pub fn smirk_features(
    snapshots: &[OptionsChainSnapshot],
    engine: &SkewEngine,
) -> BTreeMap<String, f64> {
    let mut features = BTreeMap::new();
    for snapshot in snapshots {
        let label = snapshot.expiry_label();
        let moments = IvMoments::from_snapshot(snapshot);

        let entries = [
            ("mean", moments.mean),
            ("skew", moments.skew),
            ("kurtosis", moments.kurtosis),
            ("skew_metric", engine.compute_skew(snapshot).skew),
        ];
        for (suffix, value) in entries {
            if let Some(value) = value.filter(|v| v.is_finite()) {
                features.insert(format!("{label}_{suffix}"), value);
            }
        }
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use smirk_trade_core::OptionContract;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // ============================================
    // IvMoments Tests
    // ============================================

    #[test]
    fn empty_series_has_no_moments() {
        let moments = IvMoments::from_ivs(&[]);
        assert_eq!(moments.count, 0);
        assert_eq!(moments.mean, None);
        assert_eq!(moments.skew, None);
    }

    #[test]
    fn short_series_only_has_mean() {
        let moments = IvMoments::from_ivs(&[0.5, 0.7]);
        assert!(approx(moments.mean.unwrap(), 0.6));
        assert_eq!(moments.skew, None);
        assert_eq!(moments.kurtosis, None);
    }

    #[test]
    fn symmetric_series_has_zero_skew() {
        let moments = IvMoments::from_ivs(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(approx(moments.mean.unwrap(), 3.0));
        assert!(approx(moments.skew.unwrap(), 0.0));
        // pandas: Series([1,2,3,4,5]).kurt() == -1.2
        assert!(approx(moments.kurtosis.unwrap(), -1.2));
    }

    #[test]
    fn right_tail_gives_positive_skew() {
        let moments = IvMoments::from_ivs(&[1.0, 2.0, 3.0, 10.0]);
        assert!(approx(moments.skew.unwrap(), 1.763_632_614_803_888));
        assert!(approx(moments.kurtosis.unwrap(), 3.228));
    }

    #[test]
    fn constant_series_is_flat() {
        let moments = IvMoments::from_ivs(&[0.6; 5]);
        assert_eq!(moments.skew, Some(0.0));
        assert_eq!(moments.kurtosis, Some(0.0));
    }

    #[test]
    fn non_finite_values_are_skipped() {
        let moments = IvMoments::from_ivs(&[0.5, f64::NAN, 0.7]);
        assert_eq!(moments.count, 2);
    }

    // ============================================
    // Feature Map Tests
    // ============================================

    #[test]
    fn features_are_keyed_by_expiry_date() {
        let snapshot = OptionsChainSnapshot::new(
            "BTC",
            60500.0,
            Utc.with_ymd_and_hms(2024, 6, 28, 8, 0, 0).unwrap(),
            vec![
                OptionContract::call(62000.0, 0.70),
                OptionContract::call(63000.0, 0.68),
                OptionContract::put(59000.0, 0.72),
                OptionContract::put(58000.0, 0.75),
            ],
        );

        let features = smirk_features(&[snapshot], &SkewEngine::default());

        assert!(approx(features["2024-06-28_mean"], 0.7125));
        assert!(features.contains_key("2024-06-28_skew"));
        assert!(features.contains_key("2024-06-28_kurtosis"));
        assert!(approx(features["2024-06-28_skew_metric"], -0.045));
    }

    #[test]
    fn undefined_values_are_omitted() {
        let snapshot = OptionsChainSnapshot::new(
            "BTC",
            60500.0,
            Utc.with_ymd_and_hms(2024, 7, 5, 8, 0, 0).unwrap(),
            vec![],
        );
        assert!(smirk_features(&[snapshot], &SkewEngine::default()).is_empty());
    }
}
