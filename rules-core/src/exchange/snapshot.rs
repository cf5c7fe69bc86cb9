// src/exchange/snapshot.rs
// Offline exchange-info source: replays a saved exchangeInfo document.

use async_trait::async_trait;
use serde_json::Value;
use std::fs;
use std::path::Path;

use super::errors::ExchangeError;
use super::traits::ExchangeInfoSource;

pub struct SnapshotSource {
    name: String,
    document: Value,
}

impl SnapshotSource {
    pub fn from_value(name: &str, document: Value) -> Self {
        Self {
            name: name.to_string(),
            document,
        }
    }

    /// Load a document saved from `GET /api/v3/exchangeInfo`
    pub fn from_file<P: AsRef<Path>>(name: &str, path: P) -> Result<Self, ExchangeError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            ExchangeError::NetworkError(format!("cannot read snapshot {}: {}", path.display(), e))
        })?;
        let document = serde_json::from_slice(&bytes)?;
        Ok(Self::from_value(name, document))
    }
}

#[async_trait]
impl ExchangeInfoSource for SnapshotSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exchange_info(&self) -> Result<Value, ExchangeError> {
        Ok(self.document.clone())
    }
}
