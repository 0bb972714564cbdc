//! Value helpers shared across the engine.
//!
//! - coerce_scalar: string to typed scalar coercion
//! - numeric_of: numeric view of a value (numbers and numeric-looking strings)
//! - values_equal / compare_values: comparison semantics used by conditions and sorting
//! - to_plain_string: canonical scalar rendering used for group keys and CONCAT

use std::cmp::Ordering;

use serde_json::Value;

/// Coerce a raw string into a typed scalar: integers, floats (including
/// exponent forms), case-insensitive `true`/`false`/`null`, otherwise the
/// string itself.
pub fn coerce_scalar(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Number(i.into());
    }
    if looks_numeric(raw) {
        if let Ok(f) = raw.parse::<f64>() {
            if let Some(n) = serde_json::Number::from_f64(f) {
                return Value::Number(n);
            }
        }
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => Value::String(raw.to_string()),
    }
}

/// Whether a string is a decimal/exponent number. `f64::from_str` also
/// accepts `inf`/`NaN`, which must stay strings.
fn looks_numeric(raw: &str) -> bool {
    let s = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
        && s.chars().next().is_some_and(|c| c.is_ascii_digit() || c == '.')
}

/// Numeric view of a value. Strings coerce when they look numeric.
pub fn numeric_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            if looks_numeric(s) {
                s.parse::<f64>().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Equality with numeric coercion: when both sides are numeric-like the
/// comparison happens on floats, otherwise on the plain-string rendering.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        _ => {
            if let (Some(a), Some(b)) = (numeric_of(left), numeric_of(right)) {
                a == b
            } else {
                to_plain_string(left) == to_plain_string(right)
            }
        }
    }
}

/// Three-way compare with nulls ordered below any value.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => {
            if let (Some(a), Some(b)) = (numeric_of(a), numeric_of(b)) {
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            } else {
                to_plain_string(a).cmp(&to_plain_string(b))
            }
        }
    }
}

/// Scalar rendering without quotes; nested values fall back to JSON.
pub fn to_plain_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

pub fn to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Convert f64 to a JSON number, falling back to 0 for NaN/Infinity.
pub fn number_from_f64(f: f64) -> serde_json::Number {
    serde_json::Number::from_f64(f).unwrap_or_else(|| serde_json::Number::from(0))
}
