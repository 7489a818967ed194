use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use smirk_trade_core::PriceBar;

const TRADING_DAYS: f64 = 252.0;
const STD_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    /// Strategy return over the bar.
    pub ret: f64,
    /// Compounded equity after the bar, starting from 1.0.
    pub equity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquityCurve {
    pub points: Vec<EquityPoint>,
}

impl EquityCurve {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compounds `ret` onto the last equity value.
    pub fn push(&mut self, timestamp: DateTime<Utc>, ret: f64) {
        let equity = self.last_equity() * (1.0 + ret);
        self.points.push(EquityPoint {
            timestamp,
            ret,
            equity,
        });
    }

    #[must_use]
    pub fn last_equity(&self) -> f64 {
        self.points.last().map_or(1.0, |p| p.equity)
    }

    #[must_use]
    pub fn equity(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.equity).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Recompounds the returns of the points matching `keep` from 1.0.
    #[must_use]
    pub fn rebased<F>(&self, keep: F) -> Self
    where
        F: Fn(&EquityPoint) -> bool,
    {
        let mut curve = Self::new();
        for point in self.points.iter().filter(|p| keep(p)) {
            curve.push(point.timestamp, point.ret);
        }
        curve
    }

    #[must_use]
    pub fn summary(&self) -> PerformanceSummary {
        performance_summary(&self.equity())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub total_return: f64,
    /// Deepest fall from a running peak; zero or negative.
    pub max_drawdown: f64,
    /// Annualized over 252 periods.
    pub sharpe: f64,
}

/// Close-to-close return of `bar` against the previous close; zero for the
/// first bar or a non-positive previous close.
#[must_use]
pub fn bar_return(previous: Option<&PriceBar>, bar: &PriceBar) -> f64 {
    let Some(prev) = previous else {
        return 0.0;
    };
    let (Some(prev_close), Some(close)) = (prev.close.to_f64(), bar.close.to_f64()) else {
        return 0.0;
    };
    if prev_close <= 0.0 {
        return 0.0;
    }
    close / prev_close - 1.0
}

/// Runs `signal_fn` over `bars` and compounds `signal * bar_return` from 1.0.
pub fn evaluate_strategy<F>(bars: &[PriceBar], mut signal_fn: F) -> EquityCurve
where
    F: FnMut(&PriceBar) -> f64,
{
    let mut curve = EquityCurve::new();
    let mut previous: Option<&PriceBar> = None;
    for bar in bars {
        let signal = signal_fn(bar);
        curve.push(bar.timestamp, signal * bar_return(previous, bar));
        previous = Some(bar);
    }
    curve
}

/// Summarizes an equity series that starts from 1.0.
///
/// Sharpe uses the sample standard deviation of period-over-period changes.
/// Fewer than two changes give a Sharpe of zero.
#[must_use]
pub fn performance_summary(equity: &[f64]) -> PerformanceSummary {
    let Some(&last) = equity.last() else {
        return PerformanceSummary::default();
    };

    let mut peak = f64::MIN;
    let mut max_drawdown = 0.0_f64;
    for &value in equity {
        peak = peak.max(value);
        if peak > 0.0 {
            max_drawdown = max_drawdown.min(value / peak - 1.0);
        }
    }

    let changes: Vec<f64> = equity
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();
    let sharpe = if changes.len() < 2 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let n = changes.len() as f64;
        let mean = changes.iter().sum::<f64>() / n;
        let variance = changes.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / (n - 1.0);
        mean / (variance.sqrt() + STD_EPSILON) * TRADING_DAYS.sqrt()
    };

    PerformanceSummary {
        total_return: last - 1.0,
        max_drawdown,
        sharpe,
    }
}
