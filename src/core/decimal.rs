//! Exact decimal conversion for prices coming off the wire.
//!
//! Upstream APIs hand out prices as JSON numbers, strings or floats. Going
//! through `f64` arithmetic turns `41754.681` into
//! `41754.680999999996856786310672760009765625`, so every price is converted
//! through its shortest textual form instead.

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Parses a textual price, accepting plain and scientific notation.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Converts a float using its shortest round-trip representation.
pub fn from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    parse_decimal(&value.to_string())
}

/// Converts a JSON price value. `null`, booleans and non-numeric strings yield `None`.
pub fn from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}
