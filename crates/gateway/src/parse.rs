//! Precision-safe payload helpers
//!
//! Prices and quantities are read from their textual form, whether the
//! exchange sends them as JSON strings or JSON numbers. Nothing goes
//! through `f64`.

use meridian_core::{LevelDelta, Order, Timestamp};
use meridian_ports::{ExchangeError, ExchangeResult};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

pub(crate) fn decode_err(what: impl std::fmt::Display) -> ExchangeError {
    ExchangeError::Decode(what.to_string())
}

fn decimal_from_text(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .ok()
        .or_else(|| Decimal::from_scientific(text).ok())
}

/// Decimal from a JSON string or number
pub fn decimal(value: &Value) -> ExchangeResult<Decimal> {
    let parsed = match value {
        Value::String(text) => decimal_from_text(text),
        Value::Number(number) => decimal_from_text(&number.to_string()),
        _ => None,
    };
    parsed.ok_or_else(|| decode_err(format!("expected decimal, got {value}")))
}

/// Member `key` of an object
pub fn field<'a>(value: &'a Value, key: &str) -> ExchangeResult<&'a Value> {
    value
        .get(key)
        .ok_or_else(|| decode_err(format!("missing field `{key}`")))
}

/// Element `index` of an array
pub fn element(value: &Value, index: usize) -> ExchangeResult<&Value> {
    value
        .get(index)
        .ok_or_else(|| decode_err(format!("missing element {index}")))
}

pub fn decimal_at(value: &Value, key: &str) -> ExchangeResult<Decimal> {
    decimal(field(value, key)?)
}

pub fn decimal_index(value: &Value, index: usize) -> ExchangeResult<Decimal> {
    decimal(element(value, index)?)
}

pub fn str_at<'a>(value: &'a Value, key: &str) -> ExchangeResult<&'a str> {
    field(value, key)?
        .as_str()
        .ok_or_else(|| decode_err(format!("field `{key}` is not a string")))
}

pub fn array_at<'a>(value: &'a Value, key: &str) -> ExchangeResult<&'a Vec<Value>> {
    as_array(field(value, key)?)
}

pub fn as_array(value: &Value) -> ExchangeResult<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| decode_err(format!("expected array, got {value}")))
}

/// Unsigned integer from a JSON number or numeric string
pub fn u64_of(value: &Value) -> ExchangeResult<u64> {
    let parsed = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| decode_err(format!("expected unsigned integer, got {value}")))
}

pub fn u64_at(value: &Value, key: &str) -> ExchangeResult<u64> {
    u64_of(field(value, key)?)
}

/// Identifier that may be sent as a string or a number
pub fn id_string(value: &Value) -> ExchangeResult<String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        _ => Err(decode_err(format!("expected identifier, got {value}"))),
    }
}

/// Timestamp from epoch seconds or milliseconds
pub fn epoch_timestamp(value: &Value, millis: bool) -> ExchangeResult<Timestamp> {
    let raw = decimal(value)?;
    let millis_total = if millis { raw } else { raw * Decimal::from(1000) };
    let ms = i64::try_from(millis_total.trunc())
        .map_err(|_| decode_err(format!("timestamp out of range: {value}")))?;
    Timestamp::from_timestamp_millis(ms)
        .ok_or_else(|| decode_err(format!("timestamp out of range: {value}")))
}

/// RFC 3339 timestamp string
pub fn rfc3339_timestamp(value: &Value) -> ExchangeResult<Timestamp> {
    let text = value
        .as_str()
        .ok_or_else(|| decode_err(format!("expected timestamp string, got {value}")))?;
    chrono::DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&chrono::Utc))
        .map_err(decode_err)
}

/// Levels given as `[price, quantity, ...]` arrays
pub fn array_levels(levels: &[Value]) -> ExchangeResult<Vec<Order>> {
    levels
        .iter()
        .map(|level| Ok(Order::new(decimal_index(level, 0)?, decimal_index(level, 1)?)))
        .collect()
}

/// `[price, amount, ...]` arrays as level deltas; a zero amount clears the level
pub fn array_changes(levels: &[Value]) -> ExchangeResult<Vec<LevelDelta>> {
    levels
        .iter()
        .map(|level| {
            Ok(LevelDelta::upsert(
                decimal_index(level, 0)?,
                decimal_index(level, 1)?,
            ))
        })
        .collect()
}

/// Levels given as objects with named price and quantity members
pub fn object_levels(levels: &[Value], price: &str, quantity: &str) -> ExchangeResult<Vec<Order>> {
    levels
        .iter()
        .map(|level| Ok(Order::new(decimal_at(level, price)?, decimal_at(level, quantity)?)))
        .collect()
}

/// Sort levels into book order and drop empty ones
///
/// Some exchanges return snapshot sides unsorted or with zero rows.
pub fn normalize_side(mut levels: Vec<Order>, descending: bool) -> Vec<Order> {
    levels.retain(|level| !level.quantity.is_zero());
    if descending {
        levels.sort_by(|a, b| b.price.cmp(&a.price));
    } else {
        levels.sort_by(|a, b| a.price.cmp(&b.price));
    }
    levels.dedup_by(|a, b| a.price == b.price);
    levels
}
