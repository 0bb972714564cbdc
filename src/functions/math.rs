//! Math functions: CEIL, FLOOR, ROUND, MOD. Inputs coerce through the
//! scalar coercer; non-numeric input is a type error.

use serde_json::Value;

use super::argument_as_number;
use crate::error::{FqlError, FqlResult};
use crate::value::number_from_f64;

pub(super) fn evaluate(name: &str, args: &[Value]) -> FqlResult<Option<Value>> {
    match name {
        "CEIL" => {
            let n = argument_as_number(name, &args[0])?;
            Ok(Some(Value::Number((n.ceil() as i64).into())))
        }
        "FLOOR" => {
            let n = argument_as_number(name, &args[0])?;
            Ok(Some(Value::Number((n.floor() as i64).into())))
        }
        "ROUND" => {
            let n = argument_as_number(name, &args[0])?;
            let precision = match args.get(1) {
                Some(v) => argument_as_number(name, v)? as i32,
                None => 0,
            };
            if precision <= 0 {
                Ok(Some(Value::Number((n.round() as i64).into())))
            } else {
                let factor = 10f64.powi(precision);
                Ok(Some(Value::Number(number_from_f64(
                    (n * factor).round() / factor,
                ))))
            }
        }
        "MOD" => {
            let n = argument_as_number(name, &args[0])?;
            let divisor = argument_as_number(name, &args[1])? as i64;
            if divisor == 0 {
                return Err(FqlError::TypeError("MOD: division by zero".to_string()));
            }
            Ok(Some(Value::Number(((n as i64) % divisor).into())))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(name: &str, args: &[Value]) -> Value {
        evaluate(name, args).unwrap().unwrap()
    }

    #[test]
    fn test_ceil_floor() {
        assert_eq!(eval("CEIL", &[json!(2.1)]), json!(3));
        assert_eq!(eval("FLOOR", &[json!(2.9)]), json!(2));
        // numeric-looking strings coerce
        assert_eq!(eval("CEIL", &[json!("4.5")]), json!(5));
    }

    #[test]
    fn test_round() {
        assert_eq!(eval("ROUND", &[json!(2.5)]), json!(3));
        assert_eq!(eval("ROUND", &[json!(2.444), json!(2)]), json!(2.44));
        assert_eq!(eval("ROUND", &[json!(2.445), json!(1)]), json!(2.4));
    }

    #[test]
    fn test_mod() {
        assert_eq!(eval("MOD", &[json!(10), json!(3)]), json!(1));
        assert!(evaluate("MOD", &[json!(10), json!(0)]).is_err());
    }

    #[test]
    fn test_non_numeric_input() {
        let err = evaluate("CEIL", &[json!("abc")]).unwrap_err();
        assert!(matches!(err, FqlError::TypeError(_)));
    }
}
