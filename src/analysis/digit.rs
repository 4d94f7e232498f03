use rust_decimal::{Decimal, RoundingStrategy};

/// Highest scale `rust_decimal` can represent.
const MAX_DECIMAL_SCALE: u32 = 28;

/// Format `value` with exactly `precision` decimals.
///
/// Exact midpoints round away from zero, so `to_fixed(2.5, 0)` is `"3"` and
/// `to_fixed(-0.125, 2)` is `"-0.13"`. Values that cannot be held by a
/// `Decimal` (non-finite, out of range, or precision above 28) fall back to
/// the standard formatter.
pub fn to_fixed(value: f64, precision: u32) -> String {
    if precision <= MAX_DECIMAL_SCALE {
        if let Some(decimal) = Decimal::from_f64_retain(value) {
            let rounded =
                decimal.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero);
            return format!("{:.*}", precision as usize, rounded);
        }
    }
    format!("{:.*}", precision as usize, value)
}

/// Last digit of `value` as displayed with `precision` decimals.
///
/// `extract_digit(9.999, 2)` is `0` because the displayed quote is `10.00`.
/// A trailing character that is not a digit (e.g. `NaN`) yields `0`.
pub fn extract_digit(value: f64, precision: u32) -> u8 {
    to_fixed(value, precision)
        .chars()
        .last()
        .and_then(|c| c.to_digit(10))
        .map(|d| d as u8)
        .unwrap_or(0)
}

pub fn is_even(digit: u8) -> bool {
    digit % 2 == 0
}

/// Digits 5-9 are "high" (over 4.5), 0-4 are "low".
pub fn is_high(digit: u8) -> bool {
    digit >= 5
}
