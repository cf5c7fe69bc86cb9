// rules-core/src/lib.rs
// Exchange trading-rules sync and order precision helpers.

pub mod config;
pub mod exchange;
pub mod logging;
pub mod service;
pub mod state;

// Re-export rules-common for convenience
pub use rules_common::data;
