// src/exchange/mod.rs

pub mod connector;
pub mod errors;
pub mod filters;
pub mod snapshot;
pub mod traits;
pub mod types;

pub use connector::BinanceConnector;
pub use errors::{ExchangeError, PrecisionError};
pub use filters::{PrecisionRounder, SymbolRounding};
pub use snapshot::SnapshotSource;
pub use traits::ExchangeInfoSource;
pub use types::{ExchangeInfo, SymbolSelection};
