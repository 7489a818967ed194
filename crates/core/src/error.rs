//! Error taxonomy for the trading cycle.
//!
//! Insufficient analysis data is deliberately absent here: an undefined skew
//! is a valid outcome and travels through the pipeline as data.

use thiserror::Error;

/// Failures that can interrupt a stage of the trading cycle.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The collaborator returned nothing for a requested expiry.
    #[error("no market data for {symbol} expiry {expiry}")]
    DataUnavailable {
        /// Underlying symbol.
        symbol: String,
        /// Requested expiry as given by the caller.
        expiry: String,
    },

    /// The market-data fetch did not complete in time.
    #[error("market data fetch for {symbol} timed out after {timeout_secs}s")]
    FetchTimeout {
        /// Underlying symbol.
        symbol: String,
        /// Timeout that elapsed.
        timeout_secs: u64,
    },

    /// The market-data collaborator failed.
    #[error("market data provider error: {0}")]
    Provider(String),

    /// A trade could not be written to the trade history.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    /// Input that can never be processed, regardless of retries.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl PipelineError {
    /// Creates a data-unavailable error.
    pub fn data_unavailable(symbol: impl Into<String>, expiry: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.into(),
            expiry: expiry.into(),
        }
    }

    /// Returns true if the next scheduling tick may succeed where this one failed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidInput(_))
    }
}
