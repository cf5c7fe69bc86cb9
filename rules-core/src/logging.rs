//! Process-wide tracing setup.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static INIT: Once = Once::new();

/// Install the fmt subscriber once. `RUST_LOG` overrides the `info` default.
/// A subscriber installed elsewhere first (e.g. by a test harness) is kept.
pub fn init_logging() {
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .with_line_number(true)
            .finish();

        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            tracing::debug!("tracing initialized");
        }
    });
}
