pub mod engine;
pub mod providers;

pub use engine::{StrategyEngine, StrategyOutput, OVERLAY_SOURCE};
pub use providers::{FeatureSource, SmirkFeatures, StaticFeatures};
