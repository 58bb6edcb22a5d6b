//! Decimal helpers for price ids and decoded numeric fields
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Every feed that keys its book by price must format that price through
//! [`format_price`] with one shared precision, otherwise two deltas for the
//! same level can land on different ids.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::errors::FieldError;

/// Largest scale `rust_decimal` can represent.
pub const MAX_PRECISION: u32 = 28;

/// Default number of fractional digits used for synthetic price ids.
pub const DEFAULT_PRICE_PRECISION: u32 = 8;

/// Render a price with exactly `precision` fractional digits.
///
/// Values with more digits are rounded, shorter ones are zero-padded, so
/// `1005.3` and `1005.300` produce the same string.
pub fn format_price(price: Decimal, precision: u32) -> String {
    let mut scaled = price.normalize();
    scaled.rescale(precision.min(MAX_PRECISION));
    scaled.to_string()
}

/// Parse a decoded numeric field.
///
/// Accepts plain (`"1020.5"`) and scientific (`"1.5e-3"`) notation.
pub fn parse_decimal_field(field: &'static str, raw: &str) -> Result<Decimal, FieldError> {
    let trimmed = raw.trim();
    let parsed = if trimmed.contains(|c: char| c == 'e' || c == 'E') {
        Decimal::from_scientific(trimmed)
    } else {
        Decimal::from_str(trimmed)
    };
    parsed.map_err(|_| FieldError::InvalidDecimal {
        field,
        value: raw.to_string(),
    })
}

/// Parse a decoded integer id field.
pub fn parse_id_field(field: &'static str, raw: &str) -> Result<u64, FieldError> {
    raw.trim().parse::<u64>().map_err(|_| FieldError::InvalidId {
        field,
        value: raw.to_string(),
    })
}
