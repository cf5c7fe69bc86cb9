use rules_common::SymbolRulesRepository;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{DatabaseSettings, Settings};
use crate::exchange::{BinanceConnector, ExchangeInfoSource, SnapshotSource};
use crate::service::{ServiceError, SymbolRulesService};

pub struct AppState {
    pub settings: Settings,
    pub repository: Arc<SymbolRulesRepository>,
    pub service: SymbolRulesService,
}

impl AppState {
    pub async fn new(settings: Settings) -> Result<Self, ServiceError> {
        tracing::info!("Initializing symbol rules state...");

        let pool = create_database_pool(&settings.database).await?;
        tracing::info!("Database connection established");

        let repository = SymbolRulesRepository::new(pool).with_exchange_name(&settings.exchange.name);
        repository.ensure_schema().await?;
        let repository = Arc::new(repository);

        let source = create_source(&settings)?;
        tracing::info!("Exchange info source: {}", source.name());

        let service = SymbolRulesService::new(source, repository.clone());

        Ok(Self {
            settings,
            repository,
            service,
        })
    }
}

fn create_source(settings: &Settings) -> Result<Arc<dyn ExchangeInfoSource>, ServiceError> {
    let exchange = &settings.exchange;
    match &exchange.snapshot_path {
        Some(path) => {
            tracing::info!("Replaying exchangeInfo snapshot from {}", path);
            Ok(Arc::new(SnapshotSource::from_file(&exchange.name, path)?))
        }
        None => Ok(Arc::new(BinanceConnector::from_settings(exchange)?)),
    }
}

pub async fn create_database_pool(settings: &DatabaseSettings) -> Result<SqlitePool, ServiceError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .max_lifetime(Duration::from_secs(settings.max_lifetime))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(&settings.url)
        .await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExchangeSettings, SyncSettings};

    fn settings(snapshot_path: Option<String>) -> Settings {
        Settings {
            database: DatabaseSettings {
                url: "sqlite::memory:".into(),
                max_connections: 1,
                min_connections: 1,
                max_lifetime: 60,
            },
            exchange: ExchangeSettings {
                name: "Binance".into(),
                base_url: "https://api.binance.com".into(),
                timeout_secs: 5,
                snapshot_path,
            },
            sync: SyncSettings {
                quote_assets: vec![],
                symbols: vec![],
            },
        }
    }

    #[tokio::test]
    async fn test_state_creates_schema() {
        let state = AppState::new(settings(None)).await.unwrap();
        assert_eq!(state.repository.count().await.unwrap(), 0);
        assert_eq!(state.repository.exchange_name(), "Binance");
    }

    #[tokio::test]
    async fn test_missing_snapshot_fails_startup() {
        let result = AppState::new(settings(Some("/nonexistent/exchange_info.json".into()))).await;
        assert!(matches!(result, Err(ServiceError::ExchangeUnavailable(_))));
    }
}
