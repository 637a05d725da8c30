//! Conversion between smallest on-chain units and human-facing units

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};
use crate::models::Amount;

/// Smallest units per human-facing unit (1 SEI = 1,000,000 usei)
pub const SMALLEST_UNITS_PER_UNIT: Decimal = dec!(1000000);

/// Parse a smallest-unit quantity string into an exact decimal.
///
/// Numerals too large for `Decimal` saturate at `Decimal::MAX`.
pub fn parse_quantity(quantity: &str) -> CoreResult<Decimal> {
    let trimmed = quantity.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidAmount("empty quantity".to_string()));
    }
    match Decimal::from_str(trimmed) {
        Ok(value) => Ok(value),
        Err(_) if overflows_decimal(trimmed) => Ok(Decimal::MAX),
        Err(e) => Err(CoreError::InvalidAmount(format!("{}: {}", trimmed, e))),
    }
}

/// Unsigned plain numeral whose integer part has more digits than `Decimal::MAX` can hold.
fn overflows_decimal(numeral: &str) -> bool {
    let (integer, fraction) = numeral.split_once('.').unwrap_or((numeral, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    !integer.is_empty()
        && all_digits(integer)
        && all_digits(fraction)
        && integer.trim_start_matches('0').len() >= 29
}

/// Parse a quantity and require it to be strictly positive.
pub fn parse_positive_quantity(quantity: &str) -> CoreResult<Decimal> {
    let value = parse_quantity(quantity)?;
    if value <= Decimal::ZERO {
        return Err(CoreError::InvalidAmount(format!(
            "quantity must be positive: {}",
            quantity
        )));
    }
    Ok(value)
}

pub fn to_units(smallest: Decimal) -> Decimal {
    smallest / SMALLEST_UNITS_PER_UNIT
}

/// Human-unit value of an amount as f64, `None` when unparseable.
pub fn amount_in_units(amount: &Amount) -> Option<f64> {
    parse_quantity(&amount.quantity)
        .ok()
        .and_then(|d| to_units(d).to_f64())
}

/// Whether `units` is an exact multiple of `base` (both in human units).
pub fn is_multiple_of(units: Decimal, base: Decimal) -> bool {
    if base <= Decimal::ZERO {
        return false;
    }
    (units % base).is_zero()
}
