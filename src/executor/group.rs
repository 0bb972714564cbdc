//! Group-and-aggregate stage. Rows passing WHERE bucket by the `|`-joined
//! string of their GROUP BY values (a single `"*"` bucket when aggregates
//! appear without GROUP BY); buckets keep first-seen order. Each group
//! projects from its first row with aggregate fields overwritten by their
//! aggregators, then HAVING filters the projected rows.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::FqlResult;
use crate::functions::aggregate as aggregate_fns;
use crate::path::get_path;
use crate::query::Query;
use crate::sources::RowStream;
use crate::value::to_plain_string;

pub(crate) fn aggregate(stream: RowStream, query: &Query) -> FqlResult<Vec<Value>> {
    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<Value>> = HashMap::new();

    for row in stream {
        let row = row?;
        if !query.where_root.evaluate(&row, false)? {
            continue;
        }
        let key = group_key(query, &row)?;
        if !buckets.contains_key(&key) {
            order.push(key.clone());
        }
        buckets.entry(key).or_default().push(row);
    }
    tracing::debug!(groups = order.len(), "group map materialized");

    let mut out = Vec::with_capacity(order.len());
    for key in &order {
        let Some(rows) = buckets.get(key) else { continue };
        let Some(first) = rows.first() else { continue };

        // First row of the group is the base; aggregates overwrite their
        // finalNames before the full projection runs.
        let mut base = match first.clone() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for field in query.selections() {
            if let Some(call) = &field.function {
                if field.is_aggregate() {
                    base.insert(field.final_name.clone(), aggregate_fns::evaluate(call, rows)?);
                }
            }
        }
        let projected = super::project(query.selections(), &Value::Object(base))?;

        if !query.having_root.is_empty() && !query.having_root.evaluate_projected(&projected)? {
            continue;
        }
        out.push(projected);
    }
    Ok(out)
}

fn group_key(query: &Query, row: &Value) -> FqlResult<String> {
    if query.group_by.is_empty() {
        return Ok("*".to_string());
    }
    let mut parts = Vec::with_capacity(query.group_by.len());
    for field in &query.group_by {
        parts.push(to_plain_string(&get_path(row, field, false)?));
    }
    Ok(parts.join("|"))
}
