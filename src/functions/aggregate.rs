//! Aggregate functions computed over a whole group of rows: COUNT, SUM,
//! AVG, MIN, MAX, GROUP_CONCAT. Null values count as absent; `COUNT(*)`
//! counts every row in the group.

use serde_json::Value;

use super::{argument_as_number, argument_as_string, Arg, FunctionCall};
use crate::error::{FqlError, FqlResult};
use crate::path::get_path;
use crate::value::{compare_values, number_from_f64, numeric_of, to_plain_string};

const DEFAULT_AVG_DECIMALS: i32 = 2;

pub fn evaluate(call: &FunctionCall, group: &[Value]) -> FqlResult<Value> {
    match call.name.as_str() {
        "COUNT" => match call.args.first() {
            None => Ok(Value::Number((group.len() as i64).into())),
            Some(Arg::Field(f)) if f == "*" => Ok(Value::Number((group.len() as i64).into())),
            Some(arg) => {
                let mut count = 0i64;
                for row in group {
                    if !arg_value(arg, row)?.is_null() {
                        count += 1;
                    }
                }
                Ok(Value::Number(count.into()))
            }
        },
        "SUM" => {
            let sum = numeric_fold(call, group)?.into_iter().sum::<f64>();
            Ok(integral_number(sum))
        }
        "AVG" => {
            let values = numeric_fold(call, group)?;
            if values.is_empty() {
                return Ok(Value::Null);
            }
            let decimals = match call.args.get(1) {
                Some(Arg::Literal(v)) => argument_as_number("AVG", v)? as i32,
                _ => DEFAULT_AVG_DECIMALS,
            };
            let avg = values.iter().sum::<f64>() / values.len() as f64;
            let factor = 10f64.powi(decimals.max(0));
            Ok(Value::Number(number_from_f64((avg * factor).round() / factor)))
        }
        "MIN" => extremum(call, group, std::cmp::Ordering::Less),
        "MAX" => extremum(call, group, std::cmp::Ordering::Greater),
        "GROUP_CONCAT" => {
            let sep = match call.args.get(1) {
                Some(Arg::Literal(v)) => argument_as_string("GROUP_CONCAT", v)?,
                _ => ",".to_string(),
            };
            let arg = &call.args[0];
            let mut parts = Vec::with_capacity(group.len());
            for row in group {
                let v = arg_value(arg, row)?;
                if !v.is_null() {
                    parts.push(to_plain_string(&v));
                }
            }
            Ok(Value::String(parts.join(&sep)))
        }
        other => Err(FqlError::UnexpectedValue(format!(
            "no aggregate evaluator for function '{}'",
            other
        ))),
    }
}

fn arg_value(arg: &Arg, row: &Value) -> FqlResult<Value> {
    match arg {
        Arg::Field(name) => get_path(row, name, false),
        Arg::Literal(v) => Ok(v.clone()),
    }
}

/// Numeric values of the first argument across the group, skipping nulls.
/// A non-null non-numeric value is a type error.
fn numeric_fold(call: &FunctionCall, group: &[Value]) -> FqlResult<Vec<f64>> {
    let arg = &call.args[0];
    let mut out = Vec::with_capacity(group.len());
    for row in group {
        let v = arg_value(arg, row)?;
        if v.is_null() {
            continue;
        }
        let n = numeric_of(&v).ok_or_else(|| {
            FqlError::TypeError(format!(
                "{}: expected a numeric value, got {}",
                call.name,
                to_plain_string(&v)
            ))
        })?;
        out.push(n);
    }
    Ok(out)
}

fn extremum(call: &FunctionCall, group: &[Value], keep: std::cmp::Ordering) -> FqlResult<Value> {
    let arg = &call.args[0];
    let mut best: Option<Value> = None;
    for row in group {
        let v = arg_value(arg, row)?;
        if v.is_null() {
            continue;
        }
        best = Some(match best {
            None => v,
            Some(cur) => {
                if compare_values(&v, &cur) == keep {
                    v
                } else {
                    cur
                }
            }
        });
    }
    Ok(best.unwrap_or(Value::Null))
}

/// Sums over integer columns stay integers.
fn integral_number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::Number((n as i64).into())
    } else {
        Value::Number(number_from_f64(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: Vec<Arg>) -> FunctionCall {
        FunctionCall::new(name, args).unwrap()
    }

    fn group() -> Vec<Value> {
        vec![
            json!({"price": 300, "name": "a"}),
            json!({"price": 300, "name": "b"}),
            json!({"price": null, "name": "c"}),
        ]
    }

    #[test]
    fn test_count_star_counts_all_rows() {
        let c = call("COUNT", vec![Arg::Field("*".into())]);
        assert_eq!(evaluate(&c, &group()).unwrap(), json!(3));
    }

    #[test]
    fn test_count_field_skips_nulls() {
        let c = call("COUNT", vec![Arg::Field("price".into())]);
        assert_eq!(evaluate(&c, &group()).unwrap(), json!(2));
    }

    #[test]
    fn test_sum() {
        let c = call("SUM", vec![Arg::Field("price".into())]);
        assert_eq!(evaluate(&c, &group()).unwrap(), json!(600));
    }

    #[test]
    fn test_sum_type_error() {
        let c = call("SUM", vec![Arg::Field("name".into())]);
        assert!(matches!(
            evaluate(&c, &group()),
            Err(FqlError::TypeError(_))
        ));
    }

    #[test]
    fn test_avg_rounds_to_decimals() {
        let rows = vec![json!({"x": 1}), json!({"x": 2})];
        let c = call("AVG", vec![Arg::Field("x".into())]);
        assert_eq!(evaluate(&c, &rows).unwrap(), json!(1.5));

        let rows = vec![json!({"x": 1}), json!({"x": 2}), json!({"x": 2})];
        let c = call("AVG", vec![Arg::Field("x".into())]);
        assert_eq!(evaluate(&c, &rows).unwrap(), json!(1.67));

        let c = call(
            "AVG",
            vec![Arg::Field("x".into()), Arg::Literal(json!(1))],
        );
        assert_eq!(evaluate(&c, &rows).unwrap(), json!(1.7));
    }

    #[test]
    fn test_avg_of_all_nulls_is_null() {
        let rows = vec![json!({"x": null})];
        let c = call("AVG", vec![Arg::Field("x".into())]);
        assert_eq!(evaluate(&c, &rows).unwrap(), Value::Null);
    }

    #[test]
    fn test_min_max() {
        let c = call("MIN", vec![Arg::Field("price".into())]);
        assert_eq!(evaluate(&c, &group()).unwrap(), json!(300));
        let rows = vec![json!({"x": 5}), json!({"x": 1}), json!({"x": 9})];
        let c = call("MAX", vec![Arg::Field("x".into())]);
        assert_eq!(evaluate(&c, &rows).unwrap(), json!(9));
        let c = call("MIN", vec![Arg::Field("x".into())]);
        assert_eq!(evaluate(&c, &rows).unwrap(), json!(1));
    }

    #[test]
    fn test_group_concat() {
        let c = call("GROUP_CONCAT", vec![Arg::Field("name".into())]);
        assert_eq!(evaluate(&c, &group()).unwrap(), json!("a,b,c"));

        let c = call(
            "GROUP_CONCAT",
            vec![Arg::Field("price".into()), Arg::Literal(json!(" / "))],
        );
        assert_eq!(evaluate(&c, &group()).unwrap(), json!("300 / 300"));
    }
}
