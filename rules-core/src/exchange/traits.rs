// src/exchange/traits.rs

use async_trait::async_trait;
use serde_json::Value;

use crate::exchange::errors::ExchangeError;

/// Upstream provider of the raw exchange-info document.
///
/// Implementations only move bytes: no filtering, no retries.
#[async_trait]
pub trait ExchangeInfoSource: Send + Sync {
    /// Venue name written next to stored records
    fn name(&self) -> &str;

    /// Fetch the current exchange-info document as raw JSON
    async fn exchange_info(&self) -> Result<Value, ExchangeError>;
}
