//! String functions: CONCAT, CONCAT_WS, EXPLODE, IMPLODE, LOWER, UPPER,
//! LENGTH, REVERSE, BASE64 encode/decode, RANDOM_STRING.

use base64::{engine::general_purpose, Engine as _};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;

use super::argument_as_string;
use crate::error::{FqlError, FqlResult};
use crate::value::to_plain_string;

const DEFAULT_RANDOM_LEN: usize = 10;

pub(super) fn evaluate(name: &str, args: &[Value]) -> FqlResult<Option<Value>> {
    match name {
        "CONCAT" => {
            let joined: String = args.iter().map(to_plain_string).collect();
            Ok(Some(Value::String(joined)))
        }
        "CONCAT_WS" => {
            let sep = argument_as_string(name, &args[0])?;
            let joined = args[1..]
                .iter()
                .map(to_plain_string)
                .collect::<Vec<_>>()
                .join(&sep);
            Ok(Some(Value::String(joined)))
        }
        "EXPLODE" => {
            let input = argument_as_string(name, &args[0])?;
            let sep = match args.get(1) {
                Some(v) => argument_as_string(name, v)?,
                None => ",".to_string(),
            };
            let parts: Vec<Value> = input
                .split(sep.as_str())
                .map(|p| Value::String(p.to_string()))
                .collect();
            Ok(Some(Value::Array(parts)))
        }
        "IMPLODE" => {
            let items = match &args[0] {
                Value::Array(items) => items,
                other => {
                    return Err(FqlError::TypeError(format!(
                        "IMPLODE: expected a sequence, got {}",
                        to_plain_string(other)
                    )))
                }
            };
            let sep = match args.get(1) {
                Some(v) => argument_as_string(name, v)?,
                None => ",".to_string(),
            };
            let joined = items
                .iter()
                .map(to_plain_string)
                .collect::<Vec<_>>()
                .join(&sep);
            Ok(Some(Value::String(joined)))
        }
        "LOWER" => {
            let s = argument_as_string(name, &args[0])?;
            Ok(Some(Value::String(s.to_lowercase())))
        }
        "UPPER" => {
            let s = argument_as_string(name, &args[0])?;
            Ok(Some(Value::String(s.to_uppercase())))
        }
        "LENGTH" => {
            let len = match &args[0] {
                Value::Array(items) => items.len(),
                other => to_plain_string(other).chars().count(),
            };
            Ok(Some(Value::Number((len as i64).into())))
        }
        "REVERSE" => {
            let s = argument_as_string(name, &args[0])?;
            Ok(Some(Value::String(s.chars().rev().collect())))
        }
        "BASE64_ENCODE" => {
            let s = argument_as_string(name, &args[0])?;
            Ok(Some(Value::String(general_purpose::STANDARD.encode(s))))
        }
        "BASE64_DECODE" => {
            let s = argument_as_string(name, &args[0])?;
            let bytes = general_purpose::STANDARD
                .decode(s)
                .map_err(|_| FqlError::TypeError("BASE64_DECODE: invalid base64".to_string()))?;
            let decoded = String::from_utf8(bytes).map_err(|_| {
                FqlError::TypeError("BASE64_DECODE: result is not valid utf8".to_string())
            })?;
            Ok(Some(Value::String(decoded)))
        }
        "RANDOM_STRING" => {
            let len = match args.first() {
                Some(v) => super::argument_as_number(name, v)? as usize,
                None => DEFAULT_RANDOM_LEN,
            };
            let s: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(len)
                .map(char::from)
                .collect();
            Ok(Some(Value::String(s)))
        }
        _ => Ok(None),
    }
}
