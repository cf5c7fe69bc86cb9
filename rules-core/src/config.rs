// rules-core/src/config.rs
// Layered settings: built-in defaults, optional `config.{toml,yaml,json}`, then `RULES__*` env vars.

use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::exchange::connector::MAINNET_API;
use crate::exchange::SymbolSelection;

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds
    pub max_lifetime: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeSettings {
    pub name: String,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Replay a saved exchangeInfo document instead of calling the venue.
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncSettings {
    #[serde(default)]
    pub quote_assets: Vec<String>,
    #[serde(default)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub exchange: ExchangeSettings,
    pub sync: SyncSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Self::defaults()?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("RULES")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("sync.quote_assets")
                    .with_list_parse_key("sync.symbols")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("database.url", "sqlite:data/symbol_rules.db?mode=rwc")?
            .set_default("database.max_connections", 5)?
            .set_default("database.min_connections", 1)?
            .set_default("database.max_lifetime", 1800)?
            .set_default("exchange.name", rules_common::data::types::DEFAULT_EXCHANGE_NAME)?
            .set_default("exchange.base_url", MAINNET_API)?
            .set_default("exchange.timeout_secs", 10)?
            .set_default("sync.quote_assets", Vec::<String>::new())?
            .set_default("sync.symbols", Vec::<String>::new())
    }

    /// Symbols the sync run should keep.
    pub fn selection(&self) -> SymbolSelection {
        SymbolSelection::new(
            self.sync.quote_assets.iter().cloned(),
            self.sync.symbols.iter().cloned(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings: Settings = Settings::defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.database.max_connections, 5);
        assert_eq!(settings.exchange.name, "Binance");
        assert_eq!(settings.exchange.base_url, "https://api.binance.com");
        assert!(settings.exchange.snapshot_path.is_none());
        assert!(settings.selection().is_unrestricted());
    }

    #[test]
    fn test_overrides_and_selection() {
        let settings: Settings = Settings::defaults()
            .unwrap()
            .set_override("sync.quote_assets", vec!["BTC", "USDT"])
            .unwrap()
            .set_override("sync.symbols", vec!["BNBETH"])
            .unwrap()
            .set_override("exchange.snapshot_path", "data/exchange_info.json")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        let selection = settings.selection();
        assert!(selection.matches("ETHBTC", "BTC"));
        assert!(selection.matches("BNBETH", "ETH"));
        assert!(!selection.matches("ADAETH", "ETH"));
        assert_eq!(
            settings.exchange.snapshot_path.as_deref(),
            Some("data/exchange_info.json")
        );
    }
}
