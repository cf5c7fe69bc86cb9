// rules-core/src/bin/sync_rules.rs
// One-shot sync of the venue's trading rules into the local store.
//
//   sync_rules            fetch + upsert the configured selection
//   sync_rules --dry-run  fetch only, print what would be written

use anyhow::{Context, Result};
use dotenvy::dotenv;
use rules_core::config::Settings;
use rules_core::exchange::SymbolRounding;
use rules_core::logging::init_logging;
use rules_core::state::AppState;
use rust_decimal::Decimal;
use std::env;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_logging();

    let dry_run = env::args().skip(1).any(|arg| arg == "--dry-run");

    let settings = Settings::new().context("loading settings")?;
    let selection = settings.selection();
    let state = AppState::new(settings)
        .await
        .context("initializing state")?;

    if dry_run {
        let eligible = state.service.fetch_eligible_symbols(&selection).await?;
        for rules in &eligible {
            let tick = rules
                .filters
                .price_filter()
                .map(|f| f.tick_size.as_str())
                .unwrap_or("-");
            let step = rules
                .filters
                .lot_size()
                .map(|f| f.step_size.as_str())
                .unwrap_or("-");
            println!("{:<14} tick={:<12} step={}", rules.symbol, tick, step);
        }
        info!("Dry run: {} symbols eligible, nothing written", eligible.len());
        return Ok(());
    }

    let stored = state
        .service
        .reconcile(&selection)
        .await
        .context("reconciling symbol rules")?;

    // Sanity pass: every stored symbol should round a unit price and quantity.
    let unusable: Vec<&str> = stored
        .iter()
        .filter(|s| {
            s.rules.round_price(Decimal::ONE, false).is_err()
                || s.rules.round_quantity(Decimal::ONE, false).is_err()
        })
        .map(|s| s.rules.symbol.as_str())
        .collect();
    if !unusable.is_empty() {
        warn!(
            "{} symbols lack usable price/lot filters: {}",
            unusable.len(),
            unusable.join(", ")
        );
    }

    let latest = stored.iter().map(|s| s.updated).max();
    info!(
        "Sync complete: {} symbols stored for {} (total in store: {}, last update: {})",
        stored.len(),
        state.repository.exchange_name(),
        state.repository.count().await?,
        latest
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string())
    );

    Ok(())
}
