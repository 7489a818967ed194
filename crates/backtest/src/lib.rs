pub mod metrics;
pub mod replay;
pub mod walk_forward;

pub use metrics::{
    bar_return, evaluate_strategy, performance_summary, EquityCurve, EquityPoint,
    PerformanceSummary,
};
pub use replay::{read_event_log, smirk_pipeline, ReplayEngine};
pub use walk_forward::{generate_windows, walk_forward_windows, BacktestWindow, WalkForwardConfig};
