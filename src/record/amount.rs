//! Monetary value normalization for denomination attributes.
//!
//! Device firmware writes denominations with whatever decimal separator the
//! host locale uses (`"50,00"` and `"50.00"` both occur in the wild), so every
//! value goes through [`parse_amount`] before it is summed or bucketed.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Number of fractional digits kept for monetary amounts.
pub const AMOUNT_SCALE: u32 = 2;

/// Round to cents, half away from zero.
pub fn round_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Parse a denomination attribute into a cent-rounded decimal.
///
/// A comma separator is treated as a decimal point. Empty or unparseable
/// text yields zero instead of an error.
pub fn parse_amount(text: &str) -> Decimal {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Decimal::ZERO;
    }

    let normalized = trimmed.replace(',', ".");
    let parsed = Decimal::from_str(&normalized).or_else(|_| Decimal::from_scientific(&normalized));

    match parsed {
        Ok(value) => round_amount(value),
        Err(_) => Decimal::ZERO,
    }
}

/// Integer histogram key for a denomination (`49.50` -> `50`, `0.49` -> `0`).
///
/// Values beyond the `i64` range land in the `0` bucket, the same bucket as
/// unparseable text.
pub fn denomination_key(value: Decimal) -> i64 {
    let rounded = value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    rounded.to_i64().unwrap_or_else(|| {
        tracing::debug!("denomination {rounded} is out of range, bucketed as 0");
        0
    })
}

/// Render an amount with exactly two fractional digits.
pub fn format_amount(value: Decimal) -> String {
    let mut rounded = round_amount(value);
    rounded.rescale(AMOUNT_SCALE);
    rounded.to_string()
}
