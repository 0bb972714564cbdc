//! Scalar and aggregate function library.
//!
//! A static registry maps function names to their shape (row, constant or
//! aggregate) and arity; the parser and the builder consult it so a bad call
//! fails before execution. Evaluation dispatches through the category
//! modules, each returning `Ok(None)` for names it does not own.

pub mod aggregate;
mod hash;
mod math;
mod misc;
mod string;

use serde_json::{Map, Value};

use crate::error::{FqlError, FqlResult};
use crate::path::get_path;
use crate::value::to_plain_string;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Computed per row; may read previously projected fields.
    Row,
    /// No row context (random generators).
    Constant,
    /// Computed over a whole group of rows.
    Aggregate,
}

pub struct FunctionSpec {
    pub name: &'static str,
    pub kind: FunctionKind,
    pub min_args: usize,
    pub max_args: Option<usize>,
}

const FUNCTIONS: &[FunctionSpec] = &[
    // aggregate
    FunctionSpec { name: "COUNT", kind: FunctionKind::Aggregate, min_args: 0, max_args: Some(1) },
    FunctionSpec { name: "SUM", kind: FunctionKind::Aggregate, min_args: 1, max_args: Some(1) },
    FunctionSpec { name: "AVG", kind: FunctionKind::Aggregate, min_args: 1, max_args: Some(2) },
    FunctionSpec { name: "MIN", kind: FunctionKind::Aggregate, min_args: 1, max_args: Some(1) },
    FunctionSpec { name: "MAX", kind: FunctionKind::Aggregate, min_args: 1, max_args: Some(1) },
    FunctionSpec { name: "GROUP_CONCAT", kind: FunctionKind::Aggregate, min_args: 1, max_args: Some(2) },
    // string
    FunctionSpec { name: "CONCAT", kind: FunctionKind::Row, min_args: 1, max_args: None },
    FunctionSpec { name: "CONCAT_WS", kind: FunctionKind::Row, min_args: 2, max_args: None },
    FunctionSpec { name: "EXPLODE", kind: FunctionKind::Row, min_args: 1, max_args: Some(2) },
    FunctionSpec { name: "IMPLODE", kind: FunctionKind::Row, min_args: 1, max_args: Some(2) },
    FunctionSpec { name: "LOWER", kind: FunctionKind::Row, min_args: 1, max_args: Some(1) },
    FunctionSpec { name: "UPPER", kind: FunctionKind::Row, min_args: 1, max_args: Some(1) },
    FunctionSpec { name: "LENGTH", kind: FunctionKind::Row, min_args: 1, max_args: Some(1) },
    FunctionSpec { name: "REVERSE", kind: FunctionKind::Row, min_args: 1, max_args: Some(1) },
    FunctionSpec { name: "BASE64_ENCODE", kind: FunctionKind::Row, min_args: 1, max_args: Some(1) },
    FunctionSpec { name: "BASE64_DECODE", kind: FunctionKind::Row, min_args: 1, max_args: Some(1) },
    FunctionSpec { name: "RANDOM_STRING", kind: FunctionKind::Constant, min_args: 0, max_args: Some(1) },
    // math
    FunctionSpec { name: "CEIL", kind: FunctionKind::Row, min_args: 1, max_args: Some(1) },
    FunctionSpec { name: "FLOOR", kind: FunctionKind::Row, min_args: 1, max_args: Some(1) },
    FunctionSpec { name: "ROUND", kind: FunctionKind::Row, min_args: 1, max_args: Some(2) },
    FunctionSpec { name: "MOD", kind: FunctionKind::Row, min_args: 2, max_args: Some(2) },
    // hash
    FunctionSpec { name: "MD5", kind: FunctionKind::Row, min_args: 1, max_args: Some(1) },
    FunctionSpec { name: "SHA1", kind: FunctionKind::Row, min_args: 1, max_args: Some(1) },
    // utility
    FunctionSpec { name: "COALESCE", kind: FunctionKind::Row, min_args: 1, max_args: None },
    FunctionSpec { name: "COALESCE_NE", kind: FunctionKind::Row, min_args: 1, max_args: None },
    FunctionSpec { name: "RANDOM_BYTES", kind: FunctionKind::Constant, min_args: 1, max_args: Some(1) },
];

/// Case-insensitive registry lookup.
pub fn lookup(name: &str) -> Option<&'static FunctionSpec> {
    let upper = name.to_ascii_uppercase();
    FUNCTIONS.iter().find(|f| f.name == upper)
}

/// One argument of a function call: a field reference resolved against the
/// row (or a previously projected field), or a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Field(String),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Arg>,
}

impl FunctionCall {
    /// Validate the name and arity against the registry.
    pub fn new(name: &str, args: Vec<Arg>) -> FqlResult<Self> {
        let spec = lookup(name)
            .ok_or_else(|| FqlError::ParseError(format!("unknown function '{}'", name)))?;
        if args.len() < spec.min_args || spec.max_args.is_some_and(|max| args.len() > max) {
            return Err(FqlError::ParseError(format!(
                "{} expects {}{} argument(s), got {}",
                spec.name,
                spec.min_args,
                match spec.max_args {
                    Some(max) if max != spec.min_args => format!("..{}", max),
                    None => "+".to_string(),
                    _ => String::new(),
                },
                args.len()
            )));
        }
        Ok(Self {
            name: spec.name.to_string(),
            args,
        })
    }

    pub fn kind(&self) -> FunctionKind {
        // The constructor guarantees the name is registered.
        lookup(&self.name).map(|s| s.kind).unwrap_or(FunctionKind::Row)
    }

    /// Canonical rendering, e.g. `ROUND(price, 2)`.
    pub fn to_sql(&self) -> String {
        let args = self
            .args
            .iter()
            .map(|a| match a {
                Arg::Field(f) => f.clone(),
                Arg::Literal(Value::String(s)) => format!("'{}'", s),
                Arg::Literal(v) => to_plain_string(v),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.name, args)
    }
}

/// Resolve call arguments against a row and the partially projected result.
/// Previously computed fields win over raw row paths, which is what lets
/// CONCAT compose aliased projections.
pub(crate) fn resolve_args(
    call: &FunctionCall,
    row: &Value,
    partial: &Map<String, Value>,
) -> FqlResult<Vec<Value>> {
    call.args
        .iter()
        .map(|arg| match arg {
            Arg::Literal(v) => Ok(v.clone()),
            Arg::Field(name) => {
                if let Some(v) = partial.get(name) {
                    Ok(v.clone())
                } else {
                    get_path(row, name, false)
                }
            }
        })
        .collect()
}

/// Evaluate a row or constant function against a row plus the projection
/// built so far.
pub fn evaluate_row(
    call: &FunctionCall,
    row: &Value,
    partial: &Map<String, Value>,
) -> FqlResult<Value> {
    let args = resolve_args(call, row, partial)?;
    if let Some(v) = string::evaluate(&call.name, &args)? {
        return Ok(v);
    }
    if let Some(v) = math::evaluate(&call.name, &args)? {
        return Ok(v);
    }
    if let Some(v) = hash::evaluate(&call.name, &args)? {
        return Ok(v);
    }
    if let Some(v) = misc::evaluate(&call.name, &args)? {
        return Ok(v);
    }
    Err(FqlError::UnexpectedValue(format!(
        "no row evaluator for function '{}'",
        call.name
    )))
}

pub(crate) fn argument_as_string(name: &str, value: &Value) -> FqlResult<String> {
    match value {
        Value::Array(_) | Value::Object(_) => Err(FqlError::TypeError(format!(
            "{}: argument must be a scalar",
            name
        ))),
        other => Ok(to_plain_string(other)),
    }
}

pub(crate) fn argument_as_number(name: &str, value: &Value) -> FqlResult<f64> {
    crate::value::numeric_of(value).ok_or_else(|| {
        FqlError::TypeError(format!(
            "{}: expected a numeric value, got {}",
            name,
            to_plain_string(value)
        ))
    })
}
