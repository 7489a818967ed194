use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Top-level configuration, passed explicitly to every stage.
///
/// Every section falls back to its defaults, so a missing key never
/// turns into a configuration error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub trading_mode: TradingMode,
    pub symbol: String,
    /// Currency used when querying the options venue (e.g. `BTC`).
    pub underlying: String,
    /// Requested expiries, either relative (`7D`, `2W`) or absolute dates.
    pub expiries: Vec<String>,
    pub analysis: AnalysisConfig,
    pub sentiment: SentimentThresholds,
    pub signal: SignalThresholds,
    pub risk: RiskConfig,
    pub strategy: StrategyConfig,
    pub scheduler: SchedulerConfig,
    pub data: DataConfig,
    pub database: DatabaseConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            trading_mode: TradingMode::Paper,
            symbol: "BTC-USD".to_string(),
            underlying: "BTC".to_string(),
            expiries: vec!["7D".to_string(), "14D".to_string(), "30D".to_string()],
            analysis: AnalysisConfig::default(),
            sentiment: SentimentThresholds::default(),
            signal: SignalThresholds::default(),
            risk: RiskConfig::default(),
            strategy: StrategyConfig::default(),
            scheduler: SchedulerConfig::default(),
            data: DataConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl AppConfig {
    /// Rejects values no stage can work with.
    ///
    /// # Errors
    /// Returns an error if capital is not positive or a fraction lies outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.risk.capital <= Decimal::ZERO {
            anyhow::bail!("risk.capital must be positive, got {}", self.risk.capital);
        }
        let fractions = [
            ("analysis.moneyness_threshold", self.analysis.moneyness_threshold),
            ("risk.confidence_level", self.risk.confidence_level),
            ("risk.max_drawdown", self.risk.max_drawdown),
            ("strategy.risk_aversion", self.strategy.risk_aversion),
            ("strategy.min_signal_strength", self.strategy.min_signal_strength),
            ("signal.bullish_confidence_min", self.signal.bullish_confidence_min),
            ("signal.bearish_confidence_min", self.signal.bearish_confidence_min),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{name} must be in [0.0, 1.0], got {value}");
            }
        }
        if self.scheduler.cycle_interval_secs == 0 {
            anyhow::bail!("scheduler.cycle_interval_secs must be at least 1");
        }
        Ok(())
    }
}

/// How trades produced by the cycle are sourced and recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    #[default]
    Paper,
    Backtest,
}

impl TradingMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Paper => "paper",
            Self::Backtest => "backtest",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "live" => Some(Self::Live),
            "paper" => Some(Self::Paper),
            "backtest" => Some(Self::Backtest),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Distance from spot, as a fraction, beyond which a strike counts as OTM.
    pub moneyness_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            moneyness_threshold: default_moneyness_threshold(),
        }
    }
}

const fn default_moneyness_threshold() -> f64 {
    0.02 // 2%
}

/// Thresholds mapping a skew metric to a sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentThresholds {
    pub bullish_skew_diff: f64,
    pub bearish_skew_diff: f64,
    pub min_confidence: f64,
}

impl Default for SentimentThresholds {
    fn default() -> Self {
        Self {
            bullish_skew_diff: 0.02,
            bearish_skew_diff: -0.02,
            min_confidence: 0.6,
        }
    }
}

impl SentimentThresholds {
    #[must_use]
    pub const fn new(bullish_skew_diff: f64, bearish_skew_diff: f64, min_confidence: f64) -> Self {
        Self {
            bullish_skew_diff,
            bearish_skew_diff,
            min_confidence,
        }
    }
}

/// Minimum sentiment confidence required before a signal is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalThresholds {
    pub bullish_confidence_min: f64,
    pub bearish_confidence_min: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            bullish_confidence_min: 0.7,
            bearish_confidence_min: 0.7,
        }
    }
}

impl SignalThresholds {
    #[must_use]
    pub const fn new(bullish_confidence_min: f64, bearish_confidence_min: f64) -> Self {
        Self {
            bullish_confidence_min,
            bearish_confidence_min,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub capital: Decimal,
    /// Tail probability used for CVaR.
    pub confidence_level: f64,
    /// Fraction of an allocation that may be lost.
    pub max_drawdown: f64,
    pub max_open_positions: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            capital: default_capital(),
            confidence_level: 0.95,
            max_drawdown: 0.2,
            max_open_positions: 10,
        }
    }
}

impl RiskConfig {
    /// Creates a risk config with the given capital and default limits.
    #[must_use]
    pub fn with_capital(capital: Decimal) -> Self {
        Self {
            capital,
            ..Self::default()
        }
    }
}

fn default_capital() -> Decimal {
    Decimal::from(100_000)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub risk_aversion: f64,
    pub min_signal_strength: f64,
    /// Per-provider weights; providers without an entry weigh 1.0.
    pub ensemble_weights: BTreeMap<String, f64>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            risk_aversion: 0.5,
            min_signal_strength: 0.1,
            ensemble_weights: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub cycle_interval_secs: u64,
    pub fetch_timeout_secs: u64,
    /// Units traded per recorded signal, before the risk budget caps it.
    pub trade_quantity: Decimal,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval(),
            fetch_timeout_secs: default_fetch_timeout(),
            trade_quantity: Decimal::ONE,
        }
    }
}

const fn default_cycle_interval() -> u64 {
    3600 // hourly
}

const fn default_fetch_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub provider: String,
    pub base_url: String,
    pub cache_dir: PathBuf,
    pub cache_ttl_secs: u64,
    pub rate_limit_per_sec: u32,
    pub timeout_secs: u64,
    /// JSON file of snapshots served instead of a live venue.
    pub fixture_path: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            provider: "deribit".to_string(),
            base_url: "https://www.deribit.com/api/v2".to_string(),
            cache_dir: PathBuf::from(".cache/deribit"),
            cache_ttl_secs: 300,
            rate_limit_per_sec: 10,
            timeout_secs: 10,
            fixture_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL URL; trades stay in memory when unset.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}
