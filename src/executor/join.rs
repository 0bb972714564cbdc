//! Hash join stage. The right side (a sub-query) is materialized once into
//! a key multimap; the left side streams through, each row expanding into
//! the cartesian product of its matches. LEFT joins zero-fill the right
//! schema observed during the build. Right rows that never match are only
//! tracked for statistics.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{FqlError, FqlResult};
use crate::path::get_path;
use crate::query::{ComparisonOp, JoinKind, JoinSpec};
use crate::sources::RowStream;
use crate::value::{compare_values, numeric_of, to_plain_string, values_equal};

pub(crate) fn apply(left: RowStream, spec: &JoinSpec) -> FqlResult<RowStream> {
    let right_rows: Vec<Value> =
        super::run(&spec.right)?.collect::<FqlResult<Vec<_>>>()?;

    let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
    let mut schema: Vec<String> = Vec::new();
    for (i, row) in right_rows.iter().enumerate() {
        let key = get_path(row, &spec.right_key, false)?;
        if !key.is_null() {
            by_key.entry(canonical_key(&key)).or_default().push(i);
        }
        if let Value::Object(map) = row {
            for k in map.keys() {
                if !schema.iter().any(|s| s == k) {
                    schema.push(k.clone());
                }
            }
        }
    }
    tracing::debug!(
        rows = right_rows.len(),
        keys = by_key.len(),
        "join build side materialized"
    );

    Ok(Box::new(JoinStream {
        left,
        right_rows: Arc::new(right_rows),
        by_key,
        schema,
        alias: spec.alias.clone(),
        left_key: spec.left_key.clone(),
        right_key: spec.right_key.clone(),
        op: spec.op,
        kind: spec.kind,
        pending: VecDeque::new(),
        used_keys: HashSet::new(),
        reported: false,
    }))
}

struct JoinStream {
    left: RowStream,
    right_rows: Arc<Vec<Value>>,
    by_key: HashMap<String, Vec<usize>>,
    schema: Vec<String>,
    alias: Option<String>,
    left_key: String,
    right_key: String,
    op: ComparisonOp,
    kind: JoinKind,
    pending: VecDeque<Value>,
    used_keys: HashSet<String>,
    reported: bool,
}

impl Iterator for JoinStream {
    type Item = FqlResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Some(Ok(row));
            }
            match self.left.next() {
                None => {
                    if !self.reported {
                        self.reported = true;
                        let unmatched = self
                            .by_key
                            .keys()
                            .filter(|k| !self.used_keys.contains(*k))
                            .count();
                        tracing::debug!(unmatched, "join keys never matched by the left side");
                    }
                    return None;
                }
                Some(Err(e)) => return Some(Err(e)),
                Some(Ok(left_row)) => {
                    if let Err(e) = self.expand(&left_row) {
                        return Some(Err(e));
                    }
                }
            }
        }
    }
}

impl JoinStream {
    fn expand(&mut self, left_row: &Value) -> FqlResult<()> {
        let left_val = get_path(left_row, &self.left_key, false)?;

        let matches: Vec<usize> = if left_val.is_null() {
            Vec::new()
        } else if self.op == ComparisonOp::Eq {
            let key = canonical_key(&left_val);
            let hits = self.by_key.get(&key).cloned().unwrap_or_default();
            if !hits.is_empty() {
                self.used_keys.insert(key);
            }
            hits
        } else {
            let mut hits = Vec::new();
            for (i, row) in self.right_rows.iter().enumerate() {
                let right_val = get_path(row, &self.right_key, false)?;
                if !right_val.is_null() && matches_op(&left_val, self.op, &right_val)? {
                    self.used_keys.insert(canonical_key(&right_val));
                    hits.push(i);
                }
            }
            hits
        };

        if matches.is_empty() {
            if self.kind == JoinKind::Left {
                self.pending.push_back(self.merge_zero(left_row));
            }
            return Ok(());
        }
        let right_rows = Arc::clone(&self.right_rows);
        for i in matches {
            self.pending.push_back(merge(left_row, &right_rows[i], &self.alias));
        }
        Ok(())
    }

    /// LEFT join miss: the right contribution is the build-time schema
    /// filled with nulls (empty when the right side itself was empty).
    fn merge_zero(&self, left_row: &Value) -> Value {
        let mut zero = Map::new();
        for key in &self.schema {
            zero.insert(key.clone(), Value::Null);
        }
        merge(left_row, &Value::Object(zero), &self.alias)
    }
}

/// With an alias the right row nests under the alias key; flat merges never
/// overwrite an existing left key.
fn merge(left: &Value, right: &Value, alias: &Option<String>) -> Value {
    let mut out = match left {
        Value::Object(map) => map.clone(),
        other => {
            let mut map = Map::new();
            if !other.is_null() {
                map.insert("value".to_string(), other.clone());
            }
            map
        }
    };
    match alias {
        Some(name) => {
            out.insert(name.clone(), right.clone());
        }
        None => {
            if let Value::Object(rmap) = right {
                for (k, v) in rmap {
                    out.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
        }
    }
    Value::Object(out)
}

/// Canonical hash key: numeric-like values collapse to one representation
/// so `1`, `1.0` and `"1"` join together.
fn canonical_key(value: &Value) -> String {
    match numeric_of(value) {
        Some(n) => n.to_string(),
        None => to_plain_string(value),
    }
}

fn matches_op(left: &Value, op: ComparisonOp, right: &Value) -> FqlResult<bool> {
    let ord = compare_values(left, right);
    Ok(match op {
        ComparisonOp::Eq => values_equal(left, right),
        ComparisonOp::NotEq => !values_equal(left, right),
        ComparisonOp::Lt => ord == std::cmp::Ordering::Less,
        ComparisonOp::LtEq => ord != std::cmp::Ordering::Greater,
        ComparisonOp::Gt => ord == std::cmp::Ordering::Greater,
        ComparisonOp::GtEq => ord != std::cmp::Ordering::Less,
        other => {
            return Err(FqlError::JoinError(format!(
                "operator {} is not supported in a join condition",
                other.as_sql()
            )))
        }
    })
}
