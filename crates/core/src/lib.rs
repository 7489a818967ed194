pub mod config;
pub mod config_loader;
pub mod config_watcher;
pub mod error;
pub mod events;
pub mod metrics;
pub mod options;
pub mod portfolio;
pub mod report;
pub mod risk;
pub mod signal;

pub use config::{
    AnalysisConfig, AppConfig, DataConfig, DatabaseConfig, RiskConfig, SchedulerConfig,
    SentimentThresholds, SignalThresholds, StrategyConfig, TradingMode,
};
pub use config_loader::ConfigLoader;
pub use config_watcher::ConfigWatcher;
pub use error::PipelineError;
pub use events::{MarketDataEvent, PriceBar, TradeSide};
pub use metrics::{MetricsRegistry, MetricsSnapshot, TimerGuard};
pub use options::{Greeks, OptionContract, OptionKind, OptionsChainSnapshot};
pub use portfolio::{Portfolio, Position, TradeEffect};
pub use report::RiskReport;
pub use risk::{RiskBudget, RiskBudgeter};
pub use signal::{combine, FeatureProvider, SignalAction, SignalOverlay, TradingSignal};
