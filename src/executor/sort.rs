//! Sort stage. Materializes the stream and applies a single compound
//! comparator: ASC/DESC via three-way compare with nulls below any value,
//! NATSORT via natural string compare, SHUFFLE via the host RNG. The sort
//! is stable, so equal keys keep their pre-sort relative order.

use std::cmp::Ordering;

use rand::seq::SliceRandom;
use serde_json::Value;

use crate::error::{FqlError, FqlResult};
use crate::path::get_path;
use crate::query::{OrderSpec, SortMode};
use crate::sources::RowStream;
use crate::value::{compare_values, to_plain_string};

pub(crate) fn apply(stream: RowStream, orderings: &[OrderSpec]) -> FqlResult<RowStream> {
    if orderings.len() > 1 && orderings.iter().any(|o| o.mode == SortMode::Shuffle) {
        return Err(FqlError::SortError(
            "SHUFFLE cannot be combined with other sort keys".to_string(),
        ));
    }

    let mut rows: Vec<Value> = stream.collect::<FqlResult<Vec<_>>>()?;
    tracing::debug!(rows = rows.len(), "sort buffer materialized");

    if orderings.first().map(|o| o.mode) == Some(SortMode::Shuffle) {
        rows.shuffle(&mut rand::thread_rng());
    } else {
        let orderings = orderings.to_vec();
        rows.sort_by(|a, b| {
            for spec in &orderings {
                let av = sort_key(a, &spec.field);
                let bv = sort_key(b, &spec.field);
                let ord = match spec.mode {
                    SortMode::Asc => compare_values(&av, &bv),
                    SortMode::Desc => compare_values(&bv, &av),
                    SortMode::Natsort => natural_cmp(&to_plain_string(&av), &to_plain_string(&bv)),
                    SortMode::Shuffle => Ordering::Equal,
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }
    Ok(Box::new(rows.into_iter().map(Ok)))
}

// Lenient path access never fails, so missing sort keys order as nulls.
fn sort_key(row: &Value, field: &str) -> Value {
    get_path(row, field, false).unwrap_or(Value::Null)
}

/// Natural compare: digit runs compare as numbers, everything else as
/// characters ("item2" < "item10").
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ca = a.chars().peekable();
    let mut cb = b.chars().peekable();
    loop {
        match (ca.peek().copied(), cb.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let na = digit_run(&mut ca);
                let nb = digit_run(&mut cb);
                let ord = compare_digit_runs(&na, &nb);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                ca.next();
                cb.next();
            }
        }
    }
}

fn digit_run(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.peek() {
        if c.is_ascii_digit() {
            run.push(*c);
            chars.next();
        } else {
            break;
        }
    }
    run
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
