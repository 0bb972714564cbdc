//! Streaming execution pipeline.
//!
//! Stages compose over the source iterator in a fixed order:
//! scan -> join -> {where, project, having | group+aggregate+having} ->
//! sort -> limit/offset. Pure select/where/project/limit streams in O(1)
//! memory; join build sides, group maps and sort buffers materialize.

pub(crate) mod group;
pub(crate) mod join;
pub(crate) mod sort;

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::{FqlError, FqlResult};
use crate::functions::{self, FunctionKind};
use crate::path::get_path;
use crate::query::{Query, SelectedField};
use crate::sources::RowStream;

/// Build the full pipeline for a query whose sources are resolved.
pub(crate) fn run(query: &Query) -> FqlResult<RowStream> {
    let source = query.source.clone().ok_or_else(|| {
        FqlError::UnexpectedValue("query executed before its source was resolved".to_string())
    })?;
    let mut stream = source.stream_rows(query.selector.as_deref())?;

    for spec in &query.joins {
        stream = join::apply(stream, spec)?;
    }

    let mut stream: RowStream = if query.is_grouped() {
        Box::new(group::aggregate(stream, query)?.into_iter().map(Ok))
    } else {
        streaming_stage(stream, query)
    };

    if !query.order_by.is_empty() {
        stream = sort::apply(stream, &query.order_by)?;
    }

    if let Some(offset) = query.offset {
        stream = Box::new(stream.skip(offset));
    }
    if let Some(limit) = query.limit {
        stream = Box::new(stream.take(limit));
    }
    Ok(stream)
}

/// The non-aggregating per-row stage: WHERE on the raw row, projection,
/// HAVING on the projected row, DISTINCT on the canonical serialization.
fn streaming_stage(stream: RowStream, query: &Query) -> RowStream {
    let where_root = query.where_root.clone();
    let selections = query.selections.to_vec();
    let having_root = query.having_root.clone();
    let distinct = query.distinct;
    let mut seen: HashSet<String> = HashSet::new();

    Box::new(stream.filter_map(move |row| {
        let row = match row {
            Ok(r) => r,
            Err(e) => return Some(Err(e)),
        };
        match where_root.evaluate(&row, false) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => return Some(Err(e)),
        }
        let projected = match project(&selections, &row) {
            Ok(p) => p,
            Err(e) => return Some(Err(e)),
        };
        if !having_root.is_empty() {
            match having_root.evaluate_projected(&projected) {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
        if distinct {
            let key = serde_json::to_string(&projected).unwrap_or_default();
            if !seen.insert(key) {
                return None;
            }
        }
        Some(Ok(projected))
    }))
}

/// Project a row through the selections in declaration order. Row functions
/// see previously computed fields; aggregate selections read the value the
/// group stage stored under their finalName. An empty selection list is the
/// identity (`SELECT *`).
pub(crate) fn project(selections: &[SelectedField], row: &Value) -> FqlResult<Value> {
    if selections.is_empty() {
        return Ok(row.clone());
    }
    let mut out = Map::new();
    for field in selections {
        let value = match &field.function {
            Some(call) if call.kind() == FunctionKind::Aggregate => row
                .get(&field.final_name)
                .cloned()
                .unwrap_or(Value::Null),
            Some(call) => functions::evaluate_row(call, row, &out)?,
            None => get_path(row, &field.origin, false)?,
        };
        out.insert(field.final_name.clone(), value);
    }
    Ok(Value::Object(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::{Arg, FunctionCall};
    use serde_json::json;

    #[test]
    fn test_project_identity_for_select_star() {
        let row = json!({"id": 1, "name": "A"});
        assert_eq!(project(&[], &row).unwrap(), row);
    }

    #[test]
    fn test_project_order_and_aliases() {
        let row = json!({"id": 1, "name": "A", "price": 10});
        let selections = vec![
            SelectedField {
                final_name: "label".to_string(),
                origin: "name".to_string(),
                is_alias: true,
                function: None,
            },
            SelectedField::field("price"),
        ];
        let projected = project(&selections, &row).unwrap();
        assert_eq!(projected, json!({"label": "A", "price": 10}));
        // declaration order survives
        let keys: Vec<_> = projected.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["label", "price"]);
    }

    #[test]
    fn test_project_row_function_reads_partial() {
        let row = json!({"first": "Ada", "last": "Lovelace"});
        let upper = FunctionCall::new("UPPER", vec![Arg::Field("first".to_string())]).unwrap();
        let concat = FunctionCall::new(
            "CONCAT_WS",
            vec![
                Arg::Literal(json!(" ")),
                Arg::Field("shout".to_string()),
                Arg::Field("last".to_string()),
            ],
        )
        .unwrap();
        let selections = vec![
            SelectedField {
                final_name: "shout".to_string(),
                origin: "UPPER(first)".to_string(),
                is_alias: true,
                function: Some(upper),
            },
            SelectedField::call(concat),
        ];
        let projected = project(&selections, &row).unwrap();
        assert_eq!(projected["shout"], json!("ADA"));
        assert_eq!(
            projected["CONCAT_WS(' ', shout, last)"],
            json!("ADA Lovelace")
        );
    }

    #[test]
    fn test_project_missing_field_is_null() {
        let row = json!({"id": 1});
        let selections = vec![SelectedField::field("ghost")];
        assert_eq!(project(&selections, &row).unwrap(), json!({"ghost": null}));
    }
}
