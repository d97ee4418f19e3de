//! Decimal amount formatting.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round half away from zero to two places and render with exactly two decimals.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}
