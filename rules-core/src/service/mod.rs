pub mod errors;
pub mod symbol_rules;

pub use errors::ServiceError;
pub use symbol_rules::SymbolRulesService;
