//! Dotted path accessor over nested rows.
//!
//! Grammar: `segment ( '.' segment )*` where a segment is a mapping key, a
//! non-negative sequence index, `key[]->inner` (extract `inner` from every
//! element of the sequence at `key`) or `N->inner` (index then key).

use serde_json::Value;

use crate::error::{FqlError, FqlResult};

/// Resolve `path` against `row`. In strict mode a missing segment raises
/// MissingField and a subscript on a non-sequence raises TypeError; lenient
/// mode returns null instead.
pub fn get_path(row: &Value, path: &str, strict: bool) -> FqlResult<Value> {
    let mut current = row.clone();

    for segment in path.split('.') {
        if let Some((key, inner)) = segment.split_once("[]->") {
            current = step(&current, key, strict)?;
            current = extract_each(&current, key, inner, strict)?;
        } else if let Some((key, index, inner)) = split_indexed(segment) {
            current = index_step(&current, key, index, strict)?;
            current = step(&current, inner, strict)?;
        } else if let Ok(index) = segment.parse::<usize>() {
            current = index_step(&current, segment, index, strict)?;
        } else {
            current = step(&current, segment, strict)?;
        }
        if current.is_null() && !strict {
            return Ok(Value::Null);
        }
    }

    Ok(current)
}

/// `N->key` segments: a numeric index followed by a key extraction. Returns
/// the raw index text as well, since a mapping may use it as a literal key.
fn split_indexed(segment: &str) -> Option<(&str, usize, &str)> {
    let (index, inner) = segment.split_once("->")?;
    index.parse::<usize>().ok().map(|i| (index, i, inner))
}

fn step(current: &Value, key: &str, strict: bool) -> FqlResult<Value> {
    match current.get(key) {
        Some(v) => Ok(v.clone()),
        None if strict => Err(FqlError::MissingField(key.to_string())),
        None => Ok(Value::Null),
    }
}

fn index_step(current: &Value, key: &str, index: usize, strict: bool) -> FqlResult<Value> {
    match current {
        Value::Array(items) => match items.get(index) {
            Some(v) => Ok(v.clone()),
            None if strict => Err(FqlError::MissingField(key.to_string())),
            None => Ok(Value::Null),
        },
        // A mapping may legitimately use a numeric key.
        Value::Object(map) => match map.get(key) {
            Some(v) => Ok(v.clone()),
            None if strict => Err(FqlError::MissingField(key.to_string())),
            None => Ok(Value::Null),
        },
        _ if strict => Err(FqlError::TypeError(format!(
            "cannot index '{}' into a non-sequence value",
            key
        ))),
        _ => Ok(Value::Null),
    }
}

fn extract_each(current: &Value, key: &str, inner: &str, strict: bool) -> FqlResult<Value> {
    match current {
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(step(item, inner, strict)?);
            }
            Ok(Value::Array(out))
        }
        Value::Null => Ok(Value::Null),
        _ if strict => Err(FqlError::TypeError(format!(
            "'{}[]' requires a sequence value",
            key
        ))),
        _ => Ok(Value::Null),
    }
}
