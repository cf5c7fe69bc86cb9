//! Data layer for exchange trading rules: symbol descriptors, their filter
//! sets, and the SQLite-backed store that keeps one record per symbol.

pub mod data;

pub use data::repository::SymbolRulesRepository;
pub use data::types::{
    DataError, DataResult, FilterKind, StoredSymbolRules, SymbolFilter, SymbolFilters, SymbolRules,
};
