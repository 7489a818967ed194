//! Error types for market-data collaborators.

use thiserror::Error;

/// Errors raised while fetching, decoding or caching market data.
#[derive(Debug, Error)]
pub enum DataError {
    /// The venue answered with a JSON-RPC error object.
    #[error("API error: {code} - {message}")]
    Api {
        /// Venue error code.
        code: i64,
        /// Error message from the venue.
        message: String,
    },

    /// Transport or HTTP status failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Payload could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Disk cache could not be read or written.
    #[error("cache error: {0}")]
    Cache(String),

    /// Expiry string matched none of the accepted forms.
    #[error("unsupported expiry format: {0}")]
    UnsupportedExpiry(String),

    /// Response was well-formed JSON with an unexpected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl DataError {
    /// Creates an API error from code and message.
    pub fn api(code: i64, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        Self::Cache(err.to_string())
    }
}

/// Result type alias for market-data operations.
pub type Result<T> = std::result::Result<T, DataError>;
