// service/symbol_rules.rs
// Keeps the local symbol_rules store consistent with the venue's exchangeInfo.

use rules_common::{StoredSymbolRules, SymbolRules, SymbolRulesRepository};
use std::sync::Arc;
use tracing::{debug, info};

use super::errors::ServiceError;
use crate::exchange::{ExchangeInfo, ExchangeInfoSource, SymbolSelection};

pub struct SymbolRulesService {
    source: Arc<dyn ExchangeInfoSource>,
    repository: Arc<SymbolRulesRepository>,
}

impl SymbolRulesService {
    pub fn new(source: Arc<dyn ExchangeInfoSource>, repository: Arc<SymbolRulesRepository>) -> Self {
        Self { source, repository }
    }

    pub fn repository(&self) -> &SymbolRulesRepository {
        &self.repository
    }

    /// Fetch the venue's `TRADING` symbols matching `selection`.
    ///
    /// Read-only. Any transport or decoding failure surfaces as
    /// [`ServiceError::ExchangeUnavailable`]; nothing is retried here.
    pub async fn fetch_eligible_symbols(
        &self,
        selection: &SymbolSelection,
    ) -> Result<Vec<SymbolRules>, ServiceError> {
        let document = self.source.exchange_info().await?;
        let info = ExchangeInfo::from_value(document)?;
        let eligible = info.eligible_symbols(selection)?;

        debug!(
            "{} of {} symbols eligible on {}",
            eligible.len(),
            info.symbols.len(),
            self.source.name()
        );
        Ok(eligible)
    }

    /// Names of the eligible symbols, in feed order.
    pub async fn fetch_trading_symbol_names(
        &self,
        selection: &SymbolSelection,
    ) -> Result<Vec<String>, ServiceError> {
        let eligible = self.fetch_eligible_symbols(selection).await?;
        Ok(eligible.into_iter().map(|s| s.symbol).collect())
    }

    /// Fetch eligible symbols and upsert them, one record per symbol.
    ///
    /// The batch is written atomically. A symbol already stored more than
    /// once fails the call with [`ServiceError::DuplicateSymbolInvariant`] and
    /// leaves the store as it was. Returns the stored records of every
    /// reconciled symbol.
    pub async fn reconcile(
        &self,
        selection: &SymbolSelection,
    ) -> Result<Vec<StoredSymbolRules>, ServiceError> {
        let eligible = self.fetch_eligible_symbols(selection).await?;
        if eligible.is_empty() {
            info!("No eligible symbols to reconcile on {}", self.source.name());
            return Ok(Vec::new());
        }

        let stored = self.repository.upsert_batch(&eligible).await?;
        info!(
            "Reconciled {} symbols from {}",
            stored.len(),
            self.source.name()
        );
        Ok(stored)
    }
}
