//! Hash functions: MD5 and SHA1, both rendered as lowercase hex.

use serde_json::Value;
use sha1::{Digest, Sha1};

use super::argument_as_string;
use crate::error::FqlResult;

pub(super) fn evaluate(name: &str, args: &[Value]) -> FqlResult<Option<Value>> {
    match name {
        "MD5" => {
            let input = argument_as_string(name, &args[0])?;
            let digest = md5::compute(input.as_bytes());
            Ok(Some(Value::String(format!("{:x}", digest))))
        }
        "SHA1" => {
            let input = argument_as_string(name, &args[0])?;
            let mut hasher = Sha1::new();
            hasher.update(input.as_bytes());
            Ok(Some(Value::String(hex::encode(hasher.finalize()))))
        }
        _ => Ok(None),
    }
}
