//! Rolling train/test windows over a history.
//!
//! Windows roll forward by the test length, so consecutive test periods
//! tile the history without overlapping.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Configuration for walk-forward splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkForwardConfig {
    /// Length of each training window.
    pub train_window: Duration,
    /// Length of each test window, which is also the step between windows.
    pub test_window: Duration,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self::new(90, 30)
    }
}

impl WalkForwardConfig {
    #[must_use]
    pub fn new(train_days: i64, test_days: i64) -> Self {
        Self {
            train_window: Duration::days(train_days),
            test_window: Duration::days(test_days),
        }
    }
}

/// One train-then-test span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktestWindow {
    /// Start of the training period.
    pub start: DateTime<Utc>,
    /// End of training and start of testing.
    pub train_end: DateTime<Utc>,
    /// End of the test period.
    pub end: DateTime<Utc>,
}

impl BacktestWindow {
    #[must_use]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }

    #[must_use]
    pub fn in_test(&self, ts: DateTime<Utc>) -> bool {
        ts > self.train_end && ts <= self.end
    }
}

/// Splits the span of `timestamps` into walk-forward windows.
///
/// A window is emitted while `start + train + test` does not pass the last
/// timestamp. Non-positive window lengths yield no windows.
#[must_use]
pub fn walk_forward_windows(
    timestamps: &[DateTime<Utc>],
    train_days: i64,
    test_days: i64,
) -> Vec<BacktestWindow> {
    generate_windows(timestamps, WalkForwardConfig::new(train_days, test_days))
}

#[must_use]
pub fn generate_windows(timestamps: &[DateTime<Utc>], config: WalkForwardConfig) -> Vec<BacktestWindow> {
    let (Some(first), Some(last)) = (timestamps.iter().min(), timestamps.iter().max()) else {
        return Vec::new();
    };
    if config.train_window <= Duration::zero() || config.test_window <= Duration::zero() {
        tracing::warn!(
            train_days = config.train_window.num_days(),
            test_days = config.test_window.num_days(),
            "Walk-forward windows must be positive"
        );
        return Vec::new();
    }

    let mut windows = Vec::new();
    let mut start = *first;
    while start + config.train_window + config.test_window <= *last {
        let train_end = start + config.train_window;
        windows.push(BacktestWindow {
            start,
            train_end,
            end: train_end + config.test_window,
        });
        start += config.test_window;
    }
    windows
}
