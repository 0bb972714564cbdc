//! Utility functions: COALESCE, COALESCE_NE, RANDOM_BYTES.

use rand::RngCore;
use serde_json::Value;

use super::argument_as_number;
use crate::error::FqlResult;

pub(super) fn evaluate(name: &str, args: &[Value]) -> FqlResult<Option<Value>> {
    match name {
        "COALESCE" => {
            let first = args.iter().find(|v| !v.is_null()).cloned();
            Ok(Some(first.unwrap_or(Value::Null)))
        }
        "COALESCE_NE" => {
            let first = args
                .iter()
                .find(|v| !v.is_null() && v.as_str() != Some(""))
                .cloned();
            Ok(Some(first.unwrap_or(Value::Null)))
        }
        // Bytes come from the host CSPRNG and are rendered as lowercase hex.
        "RANDOM_BYTES" => {
            let len = argument_as_number(name, &args[0])? as usize;
            let mut bytes = vec![0u8; len];
            rand::thread_rng().fill_bytes(&mut bytes);
            Ok(Some(Value::String(hex::encode(bytes))))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coalesce() {
        let v = evaluate("COALESCE", &[Value::Null, json!(""), json!("x")])
            .unwrap()
            .unwrap();
        assert_eq!(v, json!(""));

        let v = evaluate("COALESCE", &[Value::Null, Value::Null])
            .unwrap()
            .unwrap();
        assert_eq!(v, Value::Null);
    }

    #[test]
    fn test_coalesce_ne_skips_empty_strings() {
        let v = evaluate("COALESCE_NE", &[Value::Null, json!(""), json!("x")])
            .unwrap()
            .unwrap();
        assert_eq!(v, json!("x"));
    }

    #[test]
    fn test_random_bytes() {
        let v = evaluate("RANDOM_BYTES", &[json!(8)]).unwrap().unwrap();
        // 8 bytes hex-encoded
        assert_eq!(v.as_str().unwrap().len(), 16);
    }
}
