use crate::exchange::ExchangeError;
use rules_common::DataError;
use thiserror::Error;

/// Service layer error types
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Exchange unavailable: {0}")]
    ExchangeUnavailable(#[from] ExchangeError),

    #[error("Duplicated symbol in internal store, symbol={symbol} ({count} records)")]
    DuplicateSymbolInvariant { symbol: String, count: usize },

    #[error("Data error: {0}")]
    Data(DataError),
}

impl From<DataError> for ServiceError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::DuplicateSymbol { symbol, count } => {
                ServiceError::DuplicateSymbolInvariant { symbol, count }
            }
            other => ServiceError::Data(other),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Data(DataError::Database(err))
    }
}
