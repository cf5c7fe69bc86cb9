use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::types::{
    DataError, DataResult, StoredSymbolRules, SymbolFilters, SymbolRules, DEFAULT_EXCHANGE_NAME,
};

// =================================================================
// Constants and Schema
// =================================================================

/// SQLite caps bound parameters per statement; lookups are chunked below it.
const MAX_LOOKUP_BATCH: usize = 500;

const SYMBOL_RULES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS symbol_rules (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL,
        base_asset TEXT NOT NULL,
        base_asset_precision INTEGER NOT NULL,
        quote_asset TEXT NOT NULL,
        quote_precision INTEGER NOT NULL,
        quote_asset_precision INTEGER NOT NULL,
        base_commission_precision INTEGER NOT NULL,
        quote_commission_precision INTEGER NOT NULL,
        order_types TEXT NOT NULL,
        iceberg_allowed INTEGER NOT NULL,
        oco_allowed INTEGER NOT NULL,
        quote_order_qty_market_allowed INTEGER NOT NULL,
        is_spot_trading_allowed INTEGER NOT NULL,
        is_margin_trading_allowed INTEGER NOT NULL,
        permissions TEXT NOT NULL,
        filters TEXT NOT NULL,
        exchange_name TEXT NOT NULL,
        created TEXT NOT NULL,
        updated TEXT NOT NULL
    )
"#;

const QUOTE_ASSET_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_symbol_rules_quote_asset ON symbol_rules(quote_asset)";

const SELECT_COLUMNS: &str = "id, symbol, status, base_asset, base_asset_precision, quote_asset, \
    quote_precision, quote_asset_precision, base_commission_precision, quote_commission_precision, \
    order_types, iceberg_allowed, oco_allowed, quote_order_qty_market_allowed, \
    is_spot_trading_allowed, is_margin_trading_allowed, permissions, filters, exchange_name, \
    created, updated";

// =================================================================
// Repository Implementation
// =================================================================

/// Store of per-symbol trading rules, at most one row per symbol.
pub struct SymbolRulesRepository {
    pool: SqlitePool,
    exchange_name: String,
}

/// List-valued columns encoded as JSON text.
struct EncodedLists {
    order_types: String,
    permissions: String,
    filters: String,
}

impl EncodedLists {
    fn encode(rules: &SymbolRules) -> DataResult<Self> {
        Ok(Self {
            order_types: serde_json::to_string(&rules.order_types)?,
            permissions: serde_json::to_string(&rules.permissions)?,
            filters: serde_json::to_string(&rules.filters)?,
        })
    }
}

impl SymbolRulesRepository {
    /// Create new repository instance
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            exchange_name: DEFAULT_EXCHANGE_NAME.to_string(),
        }
    }

    /// Tag written rows with a different venue name
    pub fn with_exchange_name(mut self, exchange_name: impl Into<String>) -> Self {
        self.exchange_name = exchange_name.into();
        self
    }

    /// Get database pool reference
    pub fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn exchange_name(&self) -> &str {
        &self.exchange_name
    }

    /// Ensure the symbol_rules table exists.
    ///
    /// A pre-existing table created without the `UNIQUE(symbol)` constraint is
    /// left untouched; `upsert_batch` still refuses to act on duplicates there.
    pub async fn ensure_schema(&self) -> DataResult<()> {
        sqlx::query(SYMBOL_RULES_TABLE).execute(&self.pool).await?;
        sqlx::query(QUOTE_ASSET_INDEX).execute(&self.pool).await?;
        debug!("symbol_rules schema ready");
        Ok(())
    }

    // =================================================================
    // Write Operations
    // =================================================================

    /// Insert or update every record of `batch` in a single transaction.
    ///
    /// A symbol with no row is inserted, a symbol with exactly one row is
    /// updated in place (its `created` timestamp is kept), and a symbol with
    /// more than one row aborts the whole batch with
    /// [`DataError::DuplicateSymbol`]. On any failure the transaction is rolled
    /// back, so either the full batch is written or none of it.
    ///
    /// Returns the stored rows of every symbol in the batch.
    pub async fn upsert_batch(&self, batch: &[SymbolRules]) -> DataResult<Vec<StoredSymbolRules>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        for rules in batch {
            rules.validate()?;
        }

        debug!("Reconciling {} symbol records", batch.len());

        let now = Utc::now();
        let mut tx = WriteTransaction::begin(&self.pool).await?;

        let outcome = match self.apply_batch(tx.connection()?, batch, now).await {
            Ok(counts) => tx.finish("COMMIT").await.map(|_| counts),
            Err(e) => Err(e),
        };

        match outcome {
            Ok((inserted, updated)) => {
                info!(
                    "Reconciled {} symbols: {} inserted, {} updated",
                    batch.len(),
                    inserted,
                    updated
                );
            }
            Err(e) => {
                if let Err(rollback_err) = tx.finish("ROLLBACK").await {
                    warn!("Rollback after failed batch also failed: {}", rollback_err);
                }
                return Err(e);
            }
        }

        let symbols: Vec<String> = batch
            .iter()
            .map(|r| r.symbol.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        self.find_by_symbols(&symbols).await
    }

    async fn apply_batch(
        &self,
        conn: &mut SqliteConnection,
        batch: &[SymbolRules],
        now: DateTime<Utc>,
    ) -> DataResult<(usize, usize)> {
        let total = batch.len();
        let mut inserted = 0;
        let mut updated = 0;

        for (staged, rules) in batch.iter().enumerate() {
            let abort = |source| DataError::BatchAborted {
                symbol: rules.symbol.clone(),
                staged,
                total,
                source,
            };
            let lists = EncodedLists::encode(rules)?;

            let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM symbol_rules WHERE symbol = ?1")
                .bind(&rules.symbol)
                .fetch_all(&mut *conn)
                .await
                .map_err(abort)?;

            match ids.as_slice() {
                [] => {
                    self.insert_row(conn, rules, &lists, now)
                        .await
                        .map_err(abort)?;
                    inserted += 1;
                }
                [id] => {
                    self.update_row(conn, *id, rules, &lists, now)
                        .await
                        .map_err(abort)?;
                    updated += 1;
                }
                _ => {
                    warn!(
                        "Duplicated symbol {} ({} rows), aborting batch after {} of {} staged",
                        rules.symbol,
                        ids.len(),
                        staged,
                        total
                    );
                    return Err(DataError::DuplicateSymbol {
                        symbol: rules.symbol.clone(),
                        count: ids.len(),
                    });
                }
            }
        }

        Ok((inserted, updated))
    }

    async fn insert_row(
        &self,
        conn: &mut SqliteConnection,
        rules: &SymbolRules,
        lists: &EncodedLists,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO symbol_rules
            (symbol, status, base_asset, base_asset_precision, quote_asset, quote_precision,
             quote_asset_precision, base_commission_precision, quote_commission_precision,
             order_types, iceberg_allowed, oco_allowed, quote_order_qty_market_allowed,
             is_spot_trading_allowed, is_margin_trading_allowed, permissions, filters,
             exchange_name, created, updated)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?19)
            "#,
        )
        .bind(&rules.symbol)
        .bind(&rules.status)
        .bind(&rules.base_asset)
        .bind(i64::from(rules.base_asset_precision))
        .bind(&rules.quote_asset)
        .bind(i64::from(rules.quote_precision))
        .bind(i64::from(rules.quote_asset_precision))
        .bind(i64::from(rules.base_commission_precision))
        .bind(i64::from(rules.quote_commission_precision))
        .bind(&lists.order_types)
        .bind(rules.iceberg_allowed)
        .bind(rules.oco_allowed)
        .bind(rules.quote_order_qty_market_allowed)
        .bind(rules.is_spot_trading_allowed)
        .bind(rules.is_margin_trading_allowed)
        .bind(&lists.permissions)
        .bind(&lists.filters)
        .bind(&self.exchange_name)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        debug!("Inserted symbol rules: {}", rules.symbol);
        Ok(())
    }

    async fn update_row(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        rules: &SymbolRules,
        lists: &EncodedLists,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE symbol_rules SET
                status = ?1, base_asset = ?2, base_asset_precision = ?3, quote_asset = ?4,
                quote_precision = ?5, quote_asset_precision = ?6, base_commission_precision = ?7,
                quote_commission_precision = ?8, order_types = ?9, iceberg_allowed = ?10,
                oco_allowed = ?11, quote_order_qty_market_allowed = ?12,
                is_spot_trading_allowed = ?13, is_margin_trading_allowed = ?14,
                permissions = ?15, filters = ?16, exchange_name = ?17, updated = ?18
            WHERE id = ?19
            "#,
        )
        .bind(&rules.status)
        .bind(&rules.base_asset)
        .bind(i64::from(rules.base_asset_precision))
        .bind(&rules.quote_asset)
        .bind(i64::from(rules.quote_precision))
        .bind(i64::from(rules.quote_asset_precision))
        .bind(i64::from(rules.base_commission_precision))
        .bind(i64::from(rules.quote_commission_precision))
        .bind(&lists.order_types)
        .bind(rules.iceberg_allowed)
        .bind(rules.oco_allowed)
        .bind(rules.quote_order_qty_market_allowed)
        .bind(rules.is_spot_trading_allowed)
        .bind(rules.is_margin_trading_allowed)
        .bind(&lists.permissions)
        .bind(&lists.filters)
        .bind(&self.exchange_name)
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        debug!("Updated symbol rules: {} (id={})", rules.symbol, id);
        Ok(())
    }

    // =================================================================
    // Query Operations
    // =================================================================

    /// Get the stored record of one symbol
    pub async fn get(&self, symbol: &str) -> DataResult<Option<StoredSymbolRules>> {
        let query = format!("SELECT {} FROM symbol_rules WHERE symbol = ?1", SELECT_COLUMNS);
        let rows = sqlx::query(&query)
            .bind(symbol)
            .fetch_all(&self.pool)
            .await?;

        if rows.len() > 1 {
            return Err(DataError::DuplicateSymbol {
                symbol: symbol.to_string(),
                count: rows.len(),
            });
        }

        rows.first().map(row_to_stored).transpose()
    }

    /// Get the stored records of the given symbols, ordered by symbol
    pub async fn find_by_symbols(&self, symbols: &[String]) -> DataResult<Vec<StoredSymbolRules>> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = Vec::with_capacity(symbols.len());
        for chunk in symbols.chunks(MAX_LOOKUP_BATCH) {
            let mut builder = QueryBuilder::<Sqlite>::new(format!(
                "SELECT {} FROM symbol_rules WHERE symbol IN (",
                SELECT_COLUMNS
            ));
            let mut separated = builder.separated(", ");
            for symbol in chunk {
                separated.push_bind(symbol.as_str());
            }
            separated.push_unseparated(")");

            let rows = builder.build().fetch_all(&self.pool).await?;
            for row in &rows {
                records.push(row_to_stored(row)?);
            }
        }

        records.sort_by(|a, b| a.rules.symbol.cmp(&b.rules.symbol).then(a.id.cmp(&b.id)));
        debug!(
            "Found {} records for {} requested symbols",
            records.len(),
            symbols.len()
        );
        Ok(records)
    }

    /// Get every stored record, ordered by symbol
    pub async fn list_all(&self) -> DataResult<Vec<StoredSymbolRules>> {
        let query = format!("SELECT {} FROM symbol_rules ORDER BY symbol, id", SELECT_COLUMNS);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_stored).collect()
    }

    /// Get stored records quoted in the given asset
    pub async fn list_by_quote_asset(&self, quote_asset: &str) -> DataResult<Vec<StoredSymbolRules>> {
        let query = format!(
            "SELECT {} FROM symbol_rules WHERE quote_asset = ?1 ORDER BY symbol, id",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(quote_asset)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_stored).collect()
    }

    /// Number of stored records
    pub async fn count(&self) -> DataResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM symbol_rules")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =================================================================
// Transaction Guard
// =================================================================

/// Pooled connection holding an open `BEGIN IMMEDIATE` transaction.
///
/// IMMEDIATE takes the write lock up front, so concurrent batches touching the
/// same symbols queue instead of racing between SELECT and INSERT. If the guard
/// is dropped before COMMIT or ROLLBACK went through (the owning future was
/// cancelled, or the rollback itself failed) the connection is detached from
/// the pool and closed rather than handed back mid-transaction.
struct WriteTransaction {
    conn: Option<PoolConnection<Sqlite>>,
}

impl WriteTransaction {
    async fn begin(pool: &SqlitePool) -> DataResult<Self> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(Self { conn: Some(conn) })
    }

    fn connection(&mut self) -> DataResult<&mut SqliteConnection> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| DataError::Validation("transaction already finished".to_string()))
    }

    /// Run COMMIT or ROLLBACK. On success the connection goes back to the pool.
    async fn finish(&mut self, statement: &str) -> DataResult<()> {
        let conn = self.connection()?;
        sqlx::query(statement).execute(&mut *conn).await?;
        self.conn = None;
        Ok(())
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!("Write transaction abandoned before completion, closing its connection");
            drop(conn.detach());
        }
    }
}

// =================================================================
// Helper Functions
// =================================================================

fn row_to_stored(row: &SqliteRow) -> DataResult<StoredSymbolRules> {
    let order_types: String = row.try_get("order_types")?;
    let permissions: String = row.try_get("permissions")?;
    let filters: String = row.try_get("filters")?;

    let rules = SymbolRules {
        symbol: row.try_get("symbol")?,
        status: row.try_get("status")?,
        base_asset: row.try_get("base_asset")?,
        base_asset_precision: precision(row, "base_asset_precision")?,
        quote_asset: row.try_get("quote_asset")?,
        quote_precision: precision(row, "quote_precision")?,
        quote_asset_precision: precision(row, "quote_asset_precision")?,
        base_commission_precision: precision(row, "base_commission_precision")?,
        quote_commission_precision: precision(row, "quote_commission_precision")?,
        order_types: serde_json::from_str(&order_types)?,
        iceberg_allowed: row.try_get("iceberg_allowed")?,
        oco_allowed: row.try_get("oco_allowed")?,
        quote_order_qty_market_allowed: row.try_get("quote_order_qty_market_allowed")?,
        is_spot_trading_allowed: row.try_get("is_spot_trading_allowed")?,
        is_margin_trading_allowed: row.try_get("is_margin_trading_allowed")?,
        filters: serde_json::from_str::<SymbolFilters>(&filters)?,
        permissions: serde_json::from_str(&permissions)?,
    };

    Ok(StoredSymbolRules {
        id: row.try_get("id")?,
        rules,
        exchange_name: row.try_get("exchange_name")?,
        created: row.try_get("created")?,
        updated: row.try_get("updated")?,
    })
}

fn precision(row: &SqliteRow, column: &str) -> DataResult<u32> {
    let raw: i64 = row.try_get(column)?;
    u32::try_from(raw).map_err(|_| {
        DataError::Validation(format!("Column {} holds invalid precision {}", column, raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::fixtures::symbol_rules;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    async fn memory_pool() -> SqlitePool {
        // A single connection keeps every query on the same in-memory database.
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    async fn repository() -> SymbolRulesRepository {
        let repo = SymbolRulesRepository::new(memory_pool().await);
        repo.ensure_schema().await.unwrap();
        repo
    }

    /// On-disk database so several pooled connections see the same data.
    struct TempDatabase {
        path: PathBuf,
    }

    impl TempDatabase {
        fn new(tag: &str) -> Self {
            let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
            let path = std::env::temp_dir().join(format!(
                "symbol_rules_{}_{}_{}.db",
                tag,
                std::process::id(),
                nanos
            ));
            Self { path }
        }

        async fn pool(&self, max_connections: u32) -> SqlitePool {
            let options = SqliteConnectOptions::new()
                .filename(&self.path)
                .create_if_missing(true)
                .busy_timeout(Duration::from_secs(30));
            SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect_with(options)
                .await
                .unwrap()
        }
    }

    impl Drop for TempDatabase {
        fn drop(&mut self) {
            for suffix in ["", "-wal", "-shm"] {
                let mut file = self.path.clone().into_os_string();
                file.push(suffix);
                let _ = std::fs::remove_file(file);
            }
        }
    }

    /// Table as created by older deployments, without the uniqueness constraint.
    async fn legacy_repository() -> SymbolRulesRepository {
        let pool = memory_pool().await;
        let legacy = SYMBOL_RULES_TABLE.replace("symbol TEXT NOT NULL UNIQUE", "symbol TEXT NOT NULL");
        sqlx::query(&legacy).execute(&pool).await.unwrap();
        let repo = SymbolRulesRepository::new(pool);
        repo.ensure_schema().await.unwrap();
        repo
    }

    async fn duplicate_row(repo: &SymbolRulesRepository, symbol: &str) {
        let columns = SELECT_COLUMNS.trim_start_matches("id, ");
        let statement = format!(
            "INSERT INTO symbol_rules ({c}) SELECT {c} FROM symbol_rules WHERE symbol = ?1",
            c = columns
        );
        sqlx::query(&statement)
            .bind(symbol)
            .execute(repo.get_pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_insert_then_read_back() {
        let repo = repository().await;
        let rules = symbol_rules("ETHBTC", "ETH", "BTC");

        let stored = repo.upsert_batch(&[rules.clone()]).await.unwrap();

        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].rules, rules);
        assert_eq!(stored[0].exchange_name, DEFAULT_EXCHANGE_NAME);
        assert_eq!(stored[0].created, stored[0].updated);
        assert_eq!(repo.get("ETHBTC").await.unwrap().unwrap().rules, rules);
        assert!(repo.get("ADABTC").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_in_place_keeps_identity() {
        let repo = repository().await;
        let first = repo
            .upsert_batch(&[symbol_rules("ETHBTC", "ETH", "BTC")])
            .await
            .unwrap();

        let mut changed = symbol_rules("ETHBTC", "ETH", "BTC");
        changed.is_margin_trading_allowed = false;
        changed.permissions.remove("MARGIN");
        let second = repo.upsert_batch(&[changed.clone()]).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(second[0].id, first[0].id);
        assert_eq!(second[0].created, first[0].created);
        assert!(second[0].updated >= first[0].updated);
        assert_eq!(second[0].rules, changed);
    }

    #[tokio::test]
    async fn test_repeated_batch_is_idempotent() {
        let repo = repository().await;
        let batch = vec![
            symbol_rules("ETHBTC", "ETH", "BTC"),
            symbol_rules("ADABTC", "ADA", "BTC"),
        ];

        let first = repo.upsert_batch(&batch).await.unwrap();
        let second = repo.upsert_batch(&batch).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 2);
        let strip = |records: &[StoredSymbolRules]| -> Vec<(i64, SymbolRules)> {
            records.iter().map(|r| (r.id, r.rules.clone())).collect()
        };
        assert_eq!(strip(&first), strip(&second));
    }

    #[tokio::test]
    async fn test_upsert_returns_only_batch_symbols() {
        let repo = repository().await;
        repo.upsert_batch(&[symbol_rules("BNBUSDT", "BNB", "USDT")])
            .await
            .unwrap();

        let stored = repo
            .upsert_batch(&[
                symbol_rules("ETHBTC", "ETH", "BTC"),
                symbol_rules("ADABTC", "ADA", "BTC"),
            ])
            .await
            .unwrap();

        let symbols: Vec<&str> = stored.iter().map(|r| r.rules.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["ADABTC", "ETHBTC"]);
        assert_eq!(repo.count().await.unwrap(), 3);
        assert_eq!(repo.list_by_quote_asset("BTC").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_symbol_aborts_whole_batch() {
        let repo = legacy_repository().await;
        repo.upsert_batch(&[symbol_rules("ETHBTC", "ETH", "BTC")])
            .await
            .unwrap();
        duplicate_row(&repo, "ETHBTC").await;

        let result = repo
            .upsert_batch(&[
                symbol_rules("ADABTC", "ADA", "BTC"),
                symbol_rules("ETHBTC", "ETH", "BTC"),
            ])
            .await;

        match result {
            Err(DataError::DuplicateSymbol { symbol, count }) => {
                assert_eq!(symbol, "ETHBTC");
                assert_eq!(count, 2);
            }
            other => panic!("expected duplicate symbol error, got {:?}", other),
        }
        // ADABTC was staged before the failure and must have been rolled back.
        assert!(repo.get("ADABTC").await.unwrap().is_none());
        assert!(matches!(
            repo.get("ETHBTC").await,
            Err(DataError::DuplicateSymbol { .. })
        ));
    }

    #[tokio::test]
    async fn test_unique_constraint_on_fresh_schema() {
        let repo = repository().await;
        repo.upsert_batch(&[symbol_rules("ETHBTC", "ETH", "BTC")])
            .await
            .unwrap();

        let columns = SELECT_COLUMNS.trim_start_matches("id, ");
        let statement = format!(
            "INSERT INTO symbol_rules ({c}) SELECT {c} FROM symbol_rules",
            c = columns
        );
        assert!(sqlx::query(&statement).execute(repo.get_pool()).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_record_is_rejected_before_writing() {
        let repo = repository().await;
        let mut broken = symbol_rules("ETHBTC", "ETH", "BTC");
        broken.base_asset.clear();

        let result = repo
            .upsert_batch(&[symbol_rules("ADABTC", "ADA", "BTC"), broken])
            .await;

        assert!(matches!(result, Err(DataError::Validation(_))));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_batches_on_same_symbols() {
        let db = TempDatabase::new("concurrent");
        let repo = Arc::new(SymbolRulesRepository::new(db.pool(8).await));
        repo.ensure_schema().await.unwrap();

        let batch = vec![
            symbol_rules("ETHBTC", "ETH", "BTC"),
            symbol_rules("ADABTC", "ADA", "BTC"),
        ];
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let repo = repo.clone();
                let batch = batch.clone();
                tokio::spawn(async move { repo.upsert_batch(&batch).await })
            })
            .collect();

        for handle in handles {
            let stored = handle.await.unwrap().unwrap();
            assert_eq!(stored.len(), 2);
        }

        let all = repo.list_all().await.unwrap();
        let symbols: HashSet<&str> = all.iter().map(|r| r.rules.symbol.as_str()).collect();
        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(symbols, HashSet::from(["ADABTC", "ETHBTC"]));
        assert!(repo.get("ETHBTC").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_abandoned_transaction_is_not_returned_to_pool() {
        let db = TempDatabase::new("abandoned");
        let repo = SymbolRulesRepository::new(db.pool(1).await);
        repo.ensure_schema().await.unwrap();

        // Dropped mid-transaction, as a cancelled upsert would leave it.
        let tx = WriteTransaction::begin(repo.get_pool()).await.unwrap();
        drop(tx);

        let stored = repo
            .upsert_batch(&[symbol_rules("ETHBTC", "ETH", "BTC")])
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_inputs() {
        let repo = repository().await;
        assert!(repo.upsert_batch(&[]).await.unwrap().is_empty());
        assert!(repo.find_by_symbols(&[]).await.unwrap().is_empty());
        assert!(repo.list_all().await.unwrap().is_empty());
    }
}
