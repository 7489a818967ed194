pub mod generator;
pub mod moments;
pub mod regime;
pub mod sentiment;
pub mod skew;

pub use generator::{SignalGenerator, SIGNAL_SOURCE};
pub use moments::{smirk_features, IvMoments};
pub use regime::{detect_regimes, RegimePoint};
pub use sentiment::{Sentiment, SentimentClassifier, SentimentDetails, SentimentResult};
pub use skew::{SkewEngine, SkewResult};
