// exchange/errors.rs

use rules_common::FilterKind;
use thiserror::Error;

/// Error types for exchange operations
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP error {0}: {1}")]
    HttpError(u16, String),

    #[error("Rate limited by exchange (HTTP {0})")]
    RateLimited(u16),

    #[error("Exchange API error {code}: {msg}")]
    ApiError { code: i64, msg: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Data parsing error: {0}")]
    ParseError(String),

    #[error("Malformed descriptor for symbol {symbol}: {reason}")]
    MalformedSymbol { symbol: String, reason: String },
}

// Convert from common error types
impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        ExchangeError::NetworkError(err.to_string())
    }
}

impl From<url::ParseError> for ExchangeError {
    fn from(err: url::ParseError) -> Self {
        ExchangeError::InvalidUrl(err.to_string())
    }
}

/// Failures of the rounding helpers, fatal to the single call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrecisionError {
    #[error("Couldn't find {0} in symbol filters")]
    MissingFilter(FilterKind),

    #[error("Malformed increment '{increment}': {reason}")]
    MalformedIncrement { increment: String, reason: String },

    #[error("Rounding {value} up by {increment} exceeds the decimal range")]
    Overflow { value: String, increment: String },
}
