//! Kelly-style position sizing and tail-risk measures.
//!
//! Sizing maps a signal strength in [0, 1] onto an edge and an implied win
//! probability:
//! ```text
//! edge     = max(strength, 0)
//! win_prob = 0.5 + edge / 2
//! b        = edge / (1 - win_prob)
//! f*       = (win_prob * (b + 1) - 1) / b      clamped to [0, 1]
//! ```
//! The allocation is `f* * capital`, and the loss budget is the allocation
//! times the configured max-drawdown fraction.

use crate::config::RiskConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Capital allocated to a signal and the loss it may incur.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBudget {
    /// Capital to deploy, never above configured capital.
    pub allocation: Decimal,
    /// `allocation * max_drawdown`.
    pub max_loss: Decimal,
    /// Edge derived from the signal strength.
    pub edge: f64,
    /// Implied win probability.
    pub win_probability: f64,
    /// Clamped Kelly fraction applied to capital.
    pub kelly_fraction: f64,
}

impl RiskBudget {
    /// A budget that allocates nothing.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            allocation: Decimal::ZERO,
            max_loss: Decimal::ZERO,
            edge: 0.0,
            win_probability: 0.5,
            kelly_fraction: 0.0,
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.allocation.is_zero()
    }
}

/// Clamped Kelly fraction for the given edge and win probability.
///
/// Degenerate inputs (`win_prob` of exactly 0 or 1, zero odds, non-finite
/// values) size to zero.
#[must_use]
pub fn kelly_fraction(edge: f64, win_prob: f64) -> f64 {
    if !edge.is_finite() || !win_prob.is_finite() {
        return 0.0;
    }
    if win_prob == 0.0 || win_prob == 1.0 {
        return 0.0;
    }
    let b = edge / (1.0 - win_prob);
    if b == 0.0 {
        return 0.0;
    }
    let fraction = (win_prob * (b + 1.0) - 1.0) / b;
    if fraction.is_nan() {
        return 0.0;
    }
    fraction.clamp(0.0, 1.0)
}

/// Kelly position size in capital units.
///
/// # Examples
/// ```
/// use smirk_trade_core::risk::kelly_position_size;
/// use rust_decimal_macros::dec;
///
/// // No edge, no allocation
/// assert_eq!(kelly_position_size(0.0, 0.5, dec!(100000)), dec!(0));
/// ```
#[must_use]
pub fn kelly_position_size(edge: f64, win_prob: f64, capital: Decimal) -> Decimal {
    if capital <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let fraction = Decimal::try_from(kelly_fraction(edge, win_prob)).unwrap_or(Decimal::ZERO);
    (capital * fraction).min(capital)
}

/// Conditional value at risk: mean of the worst `(1 - confidence_level)` tail.
///
/// At least one observation is always included; an empty (or all-NaN) input
/// yields zero.
#[must_use]
pub fn conditional_var(returns: &[f64], confidence_level: f64) -> f64 {
    let mut sorted: Vec<f64> = returns.iter().copied().filter(|r| !r.is_nan()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let index = ((1.0 - confidence_level) * sorted.len() as f64).floor().max(0.0) as usize;
    let tail = &sorted[..index.clamp(1, sorted.len())];

    #[allow(clippy::cast_precision_loss)]
    let len = tail.len() as f64;
    tail.iter().sum::<f64>() / len
}

/// Sizes a position from a signal strength under the given risk config.
#[must_use]
pub fn compute_risk_budget(signal_strength: f64, config: &RiskConfig) -> RiskBudget {
    let edge = if signal_strength.is_finite() {
        signal_strength.max(0.0)
    } else {
        0.0
    };
    let win_probability = 0.5 + edge / 2.0;
    let fraction = kelly_fraction(edge, win_probability);
    let allocation = kelly_position_size(edge, win_probability, config.capital);
    let drawdown = Decimal::try_from(config.max_drawdown).unwrap_or(Decimal::ZERO);

    RiskBudget {
        allocation,
        max_loss: allocation * drawdown,
        edge,
        win_probability,
        kelly_fraction: fraction,
    }
}

/// Stateless sizer bound to a risk configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBudgeter {
    config: RiskConfig,
}

impl RiskBudgeter {
    #[must_use]
    pub const fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Sizes a position for a signal strength in [0, 1].
    #[must_use]
    pub fn size_position(&self, signal_strength: f64) -> RiskBudget {
        compute_risk_budget(signal_strength, &self.config)
    }

    /// CVaR of a return series at the configured confidence level.
    #[must_use]
    pub fn tail_risk(&self, returns: &[f64]) -> f64 {
        conditional_var(returns, self.config.confidence_level)
    }
}

impl Default for RiskBudgeter {
    fn default() -> Self {
        Self::new(RiskConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // ============================================
    // Kelly Position Size Tests
    // ============================================

    #[test]
    fn kelly_no_allocation_without_edge() {
        assert_eq!(kelly_position_size(0.0, 0.5, dec!(100000)), Decimal::ZERO);
    }

    #[test]
    fn kelly_degenerate_win_probabilities_size_to_zero() {
        assert_eq!(kelly_position_size(0.5, 0.0, dec!(100000)), Decimal::ZERO);
        assert_eq!(kelly_position_size(0.5, 1.0, dec!(100000)), Decimal::ZERO);
    }

    #[test]
    fn kelly_stays_within_capital_bounds() {
        let size = kelly_position_size(0.1, 0.55, dec!(100000));
        assert!(size >= Decimal::ZERO);
        assert!(size <= dec!(100000));

        for edge in [0.0, 0.05, 0.3, 0.8, 5.0, 50.0] {
            for win_prob in [0.01, 0.3, 0.5, 0.75, 0.99] {
                let size = kelly_position_size(edge, win_prob, dec!(2500));
                assert!(size >= Decimal::ZERO, "edge={edge} p={win_prob}");
                assert!(size <= dec!(2500), "edge={edge} p={win_prob}");
            }
        }
    }

    #[test]
    fn kelly_known_fraction() {
        // p=0.75, b=2: f* = (0.75*3 - 1) / 2 = 0.625
        assert!((kelly_fraction(0.5, 0.75) - 0.625).abs() < 1e-12);
        assert_eq!(kelly_position_size(0.5, 0.75, dec!(1000)), dec!(625));
    }

    #[test]
    fn kelly_negative_fraction_clamps_to_zero() {
        // p=0.6, b=0.5: f* = (0.9 - 1) / 0.5 = -0.2
        assert_eq!(kelly_fraction(0.2, 0.6), 0.0);
    }

    #[test]
    fn kelly_non_positive_capital_is_zero() {
        assert_eq!(kelly_position_size(0.5, 0.75, dec!(0)), Decimal::ZERO);
        assert_eq!(kelly_position_size(0.5, 0.75, dec!(-10)), Decimal::ZERO);
    }

    #[test]
    fn kelly_nan_inputs_are_zero() {
        assert_eq!(kelly_fraction(f64::NAN, 0.6), 0.0);
        assert_eq!(kelly_fraction(0.3, f64::INFINITY), 0.0);
    }

    // ============================================
    // Conditional VaR Tests
    // ============================================

    #[test]
    fn cvar_empty_input_is_zero() {
        assert_eq!(conditional_var(&[], 0.95), 0.0);
    }

    #[test]
    fn cvar_small_sample_uses_worst_observation() {
        // floor(0.05 * 4) = 0 -> at least one element
        let cvar = conditional_var(&[0.02, -0.03, 0.01, -0.01], 0.95);
        assert!((cvar + 0.03).abs() < 1e-12);
    }

    #[test]
    fn cvar_averages_tail() {
        let returns: Vec<f64> = (1..=20).map(|i| f64::from(i) / 100.0 - 0.1).collect();
        // floor(0.25 * 20) = 5 -> mean of -0.09 ..= -0.05
        let cvar = conditional_var(&returns, 0.75);
        assert!((cvar + 0.07).abs() < 1e-12);
    }

    #[test]
    fn cvar_ignores_nan() {
        let cvar = conditional_var(&[f64::NAN, -0.05, 0.02], 0.95);
        assert!((cvar + 0.05).abs() < 1e-12);
    }

    // ============================================
    // Risk Budget Tests
    // ============================================

    #[test]
    fn risk_budget_uses_config() {
        let config = RiskConfig::with_capital(dec!(50000));
        let budget = compute_risk_budget(0.2, &config);

        assert!(budget.allocation <= config.capital);
        assert_eq!(budget.max_loss, budget.allocation * dec!(0.2));
    }

    #[test]
    fn risk_budget_strong_signal() {
        let budget = RiskBudgeter::default().size_position(0.5);

        assert!((budget.win_probability - 0.75).abs() < 1e-12);
        assert_eq!(budget.allocation, dec!(62500));
        assert_eq!(budget.max_loss, dec!(12500));
    }

    #[test]
    fn risk_budget_negative_strength_has_no_edge() {
        let budget = RiskBudgeter::default().size_position(-0.8);

        assert_eq!(budget.edge, 0.0);
        assert!(budget.is_zero());
        assert_eq!(budget.max_loss, Decimal::ZERO);
    }

    #[test]
    fn risk_budget_full_strength_is_degenerate() {
        // edge 1 -> win probability 1 -> short-circuits to zero
        let budget = RiskBudgeter::default().size_position(1.0);
        assert!(budget.is_zero());
    }

    #[test]
    fn risk_budgeter_tail_risk_uses_confidence_level() {
        let budgeter = RiskBudgeter::new(RiskConfig::default());
        assert!((budgeter.tail_risk(&[-0.2, 0.1, 0.3]) + 0.2).abs() < 1e-12);
    }
}
