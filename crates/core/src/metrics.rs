//! In-process counters, gauges and timers for the trading loop.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Default)]
struct Inner {
    counters: BTreeMap<String, f64>,
    gauges: BTreeMap<String, f64>,
    timers: BTreeMap<String, TimerStats>,
}

/// Running sum and count; only the mean is reported.
#[derive(Debug, Default, Clone, Copy)]
struct TimerStats {
    sum: f64,
    count: u64,
}

impl TimerStats {
    #[allow(clippy::cast_precision_loss)]
    fn mean(self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Cloneable handle to a shared metrics store.
#[derive(Debug, Clone, Default)]
pub struct MetricsRegistry {
    inner: Arc<Mutex<Inner>>,
}

/// Point-in-time copy of all metrics; timers report their mean in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, f64>,
    pub gauges: BTreeMap<String, f64>,
    pub timers: BTreeMap<String, f64>,
}

impl MetricsSnapshot {
    #[must_use]
    pub fn counter(&self, name: &str) -> f64 {
        self.counters.get(name).copied().unwrap_or(0.0)
    }
}

impl MetricsRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self, name: &str) {
        self.inc_by(name, 1.0);
    }

    pub fn inc_by(&self, name: &str, value: f64) {
        *self.inner.lock().counters.entry(name.to_string()).or_insert(0.0) += value;
    }

    pub fn gauge(&self, name: &str, value: f64) {
        self.inner.lock().gauges.insert(name.to_string(), value);
    }

    /// Starts a timer that records its elapsed time under `name` when dropped.
    #[must_use]
    pub fn time(&self, name: &str) -> TimerGuard {
        TimerGuard {
            registry: self.clone(),
            name: name.to_string(),
            start: Instant::now(),
        }
    }

    fn record_timing(&self, name: &str, secs: f64) {
        let mut inner = self.inner.lock();
        let stats = inner.timers.entry(name.to_string()).or_default();
        stats.sum += secs;
        stats.count += 1;
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();
        let timers = inner
            .timers
            .iter()
            .map(|(name, stats)| (name.clone(), stats.mean()))
            .collect();

        MetricsSnapshot {
            counters: inner.counters.clone(),
            gauges: inner.gauges.clone(),
            timers,
        }
    }
}

pub struct TimerGuard {
    registry: MetricsRegistry,
    name: String,
    start: Instant,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_secs_f64();
        tracing::debug!(metric = %self.name, elapsed_secs = elapsed, "timer recorded");
        self.registry.record_timing(&self.name, elapsed);
    }
}
