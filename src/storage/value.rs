//! Field value comparison
//!
//! Records are schemaless JSON, so the same logical value may arrive as a
//! number in one place and a string in another (Discord snowflakes are the
//! usual suspects). Filters and sorts go through these helpers instead of
//! `Value`'s structural equality.

use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Equality used by `WHERE field = value` filters.
pub fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Some(Ordering::Equal),
        (Value::Bool(flag), Value::Number(n)) | (Value::Number(n), Value::Bool(flag)) => {
            n.as_f64() == Some(bool_as_f64(*flag))
        }
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            n.to_string() == *s
        }
        _ => a == b,
    }
}

/// Ordering used by `ORDER BY` and `<` filters. `None` for incomparable values.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Less), // NULL sorts first
        (_, Value::Null) => Some(Ordering::Greater),

        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),

        (Value::Bool(x), Value::Number(y)) => bool_as_f64(*x).partial_cmp(&y.as_f64()?),
        (Value::Number(x), Value::Bool(y)) => x.as_f64()?.partial_cmp(&bool_as_f64(*y)),

        (Value::String(x), Value::Number(y)) => x.parse::<f64>().ok()?.partial_cmp(&y.as_f64()?),
        (Value::Number(x), Value::String(y)) => x.as_f64()?.partial_cmp(&y.parse::<f64>().ok()?),

        _ => None,
    }
}

/// Render a value as one component of a primary key.
///
/// Strings and numbers qualify; empty strings, nulls and structured values do not.
pub fn key_component(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Interpret a value as a position index (the second half of a composite key).
pub fn as_index(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            let f = n.as_f64()?;
            (f.fract() == 0.0).then_some(f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn compare_numbers(x: &Number, y: &Number) -> Option<Ordering> {
    match (x.as_i64(), y.as_i64()) {
        (Some(a), Some(b)) => Some(a.cmp(&b)),
        _ => match (x.as_u64(), y.as_u64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
    }
}

fn bool_as_f64(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}
