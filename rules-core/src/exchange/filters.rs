// File: src/exchange/filters.rs
// Rounding of prices and quantities to the increments a symbol's filters allow.

use rust_decimal::{Decimal, RoundingStrategy};
use rules_common::{FilterKind, SymbolFilters, SymbolRules};

use super::errors::PrecisionError;

/// Stateless rounding against `PRICE_FILTER.tickSize` and `LOT_SIZE.stepSize`.
///
/// All arithmetic is done on `Decimal`; increments such as `0.00000001` have no
/// exact binary float representation.
pub struct PrecisionRounder;

impl PrecisionRounder {
    /// Number of decimal places up to the last non-zero fractional digit of an
    /// increment: `"0.00100000"` is 3, `"0.00000100"` is 6, `"200"` is 0.
    pub fn decimal_places_of(increment: &str) -> Result<u32, PrecisionError> {
        let step = parse_increment(increment)?;
        Ok(step.normalize().scale())
    }

    /// Round `desired_price` to the symbol's tick size.
    ///
    /// Ties round away from zero. With `round_up` one full tick is added to the
    /// rounded value unconditionally.
    pub fn round_to_valid_price(
        filters: &SymbolFilters,
        desired_price: Decimal,
        round_up: bool,
    ) -> Result<Decimal, PrecisionError> {
        let price_filter = filters
            .price_filter()
            .ok_or(PrecisionError::MissingFilter(FilterKind::PriceFilter))?;
        round_to_increment(&price_filter.tick_size, desired_price, round_up)
    }

    /// Round `desired_quantity` to the symbol's lot step size.
    pub fn round_to_valid_quantity(
        filters: &SymbolFilters,
        desired_quantity: Decimal,
        round_up: bool,
    ) -> Result<Decimal, PrecisionError> {
        let lot_size = filters
            .lot_size()
            .ok_or(PrecisionError::MissingFilter(FilterKind::LotSize))?;
        round_to_increment(&lot_size.step_size, desired_quantity, round_up)
    }
}

/// Rounding shortcuts on a stored rule set.
pub trait SymbolRounding {
    fn round_price(&self, desired_price: Decimal, round_up: bool) -> Result<Decimal, PrecisionError>;

    fn round_quantity(
        &self,
        desired_quantity: Decimal,
        round_up: bool,
    ) -> Result<Decimal, PrecisionError>;
}

impl SymbolRounding for SymbolRules {
    fn round_price(&self, desired_price: Decimal, round_up: bool) -> Result<Decimal, PrecisionError> {
        PrecisionRounder::round_to_valid_price(&self.filters, desired_price, round_up)
    }

    fn round_quantity(
        &self,
        desired_quantity: Decimal,
        round_up: bool,
    ) -> Result<Decimal, PrecisionError> {
        PrecisionRounder::round_to_valid_quantity(&self.filters, desired_quantity, round_up)
    }
}

fn parse_increment(increment: &str) -> Result<Decimal, PrecisionError> {
    let malformed = |reason: String| PrecisionError::MalformedIncrement {
        increment: increment.to_string(),
        reason,
    };

    let step = Decimal::from_str_exact(increment.trim()).map_err(|e| malformed(e.to_string()))?;
    if step <= Decimal::ZERO {
        return Err(malformed("increment must be positive".to_string()));
    }
    Ok(step)
}

fn round_to_increment(
    increment: &str,
    desired: Decimal,
    round_up: bool,
) -> Result<Decimal, PrecisionError> {
    let step = parse_increment(increment)?.normalize();
    let places = step.scale();

    let mut rounded = desired.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    if round_up {
        rounded = rounded
            .checked_add(step)
            .ok_or_else(|| PrecisionError::Overflow {
                value: desired.to_string(),
                increment: increment.to_string(),
            })?;
    }
    // Present the result with exactly `places` fractional digits.
    rounded.rescale(places);
    Ok(rounded)
}
