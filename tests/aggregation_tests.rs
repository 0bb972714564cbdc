// Tests for GROUP BY, aggregates and HAVING over projected rows.
use std::sync::Arc;

use serde_json::json;

use fileql::{parse, FqlError, FqlResult, MemorySource, Query};

fn sales() -> Arc<MemorySource> {
    Arc::new(MemorySource::new(vec![
        json!({"category": "x", "price": 300, "name": "a"}),
        json!({"category": "x", "price": 300, "name": "b"}),
        json!({"category": "y", "price": 100, "name": "c"}),
    ]))
}

#[test]
fn test_sum_with_having_and_order() -> FqlResult<()> {
    let mut query = parse(
        "SELECT category, SUM(price) AS total FROM * \
         GROUP BY category HAVING total > 500 ORDER BY total DESC",
    )?;
    query.source(sales());
    let rows = query.execute()?.fetch_all()?;
    assert_eq!(rows, vec![json!({"category": "x", "total": 600})]);
    Ok(())
}

#[test]
fn test_group_output_preserves_first_seen_order() -> FqlResult<()> {
    let src = Arc::new(MemorySource::new(vec![
        json!({"k": "b", "v": 1}),
        json!({"k": "a", "v": 2}),
        json!({"k": "b", "v": 3}),
    ]));
    let mut query = parse("SELECT k, COUNT(*) AS n FROM * GROUP BY k")?;
    query.source(src);
    let rows = query.execute()?.fetch_all()?;
    assert_eq!(rows[0], json!({"k": "b", "n": 2}));
    assert_eq!(rows[1], json!({"k": "a", "n": 1}));
    Ok(())
}

#[test]
fn test_aggregates_without_group_by() -> FqlResult<()> {
    let mut query = parse(
        "SELECT COUNT(*) AS n, SUM(price) AS total, MIN(price) AS lo, \
         MAX(price) AS hi, AVG(price) AS mean FROM *",
    )?;
    query.source(sales());
    let rows = query.execute()?.fetch_all()?;
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0],
        json!({"n": 3, "total": 700, "lo": 100, "hi": 300, "mean": 233.33})
    );
    Ok(())
}

#[test]
fn test_count_field_skips_nulls() -> FqlResult<()> {
    let src = Arc::new(MemorySource::new(vec![
        json!({"v": 1}),
        json!({"v": null}),
        json!({"other": true}),
    ]));
    let mut query = parse("SELECT COUNT(v) AS with_value, COUNT(*) AS all_rows FROM *")?;
    query.source(src);
    let row = query.execute()?.fetch()?.unwrap();
    assert_eq!(row, json!({"with_value": 1, "all_rows": 3}));
    Ok(())
}

#[test]
fn test_group_concat_with_separator() -> FqlResult<()> {
    let mut query = parse(
        "SELECT category, GROUP_CONCAT(name, '-') AS names FROM * GROUP BY category",
    )?;
    query.source(sales());
    let rows = query.execute()?.fetch_all()?;
    assert_eq!(rows[0], json!({"category": "x", "names": "a-b"}));
    assert_eq!(rows[1], json!({"category": "y", "names": "c"}));
    Ok(())
}

#[test]
fn test_having_unknown_field_is_missing_field() -> FqlResult<()> {
    let mut query = parse(
        "SELECT category, SUM(price) AS total FROM * GROUP BY category HAVING price > 0",
    )?;
    query.source(sales());
    // `price` is a raw source key, not a projected finalName
    assert!(matches!(
        query.execute()?.fetch_all(),
        Err(FqlError::MissingField(_))
    ));
    Ok(())
}

#[test]
fn test_where_filters_rows_before_buckets_form() -> FqlResult<()> {
    let mut query = parse(
        "SELECT category, SUM(price) AS total FROM * WHERE name != 'b' GROUP BY category",
    )?;
    query.source(sales());
    let rows = query.execute()?.fetch_all()?;
    assert_eq!(rows[0], json!({"category": "x", "total": 300}));
    Ok(())
}

#[test]
fn test_compound_group_key_joined_with_pipe() -> FqlResult<()> {
    let src = Arc::new(MemorySource::new(vec![
        json!({"a": 1, "b": "u"}),
        json!({"a": 1, "b": "v"}),
        json!({"a": 1, "b": "u"}),
    ]));
    let mut query = parse("SELECT a, b, COUNT(*) AS n FROM * GROUP BY a, b")?;
    query.source(src);
    let rows = query.execute()?.fetch_all()?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], json!({"a": 1, "b": "u", "n": 2}));
    assert_eq!(rows[1], json!({"a": 1, "b": "v", "n": 1}));
    Ok(())
}

#[test]
fn test_sum_of_non_numeric_is_a_type_error() -> FqlResult<()> {
    let mut query = parse("SELECT SUM(name) AS s FROM *")?;
    query.source(sales());
    assert!(matches!(
        query.execute()?.fetch_all(),
        Err(FqlError::TypeError(_))
    ));
    Ok(())
}

#[test]
fn test_results_aggregate_helpers_agree_with_query_aggregates() -> FqlResult<()> {
    let mut results = Query::from_source(sales()).execute()?;
    let sum = results.sum("price")?;
    let count = results.count()?;
    let avg = results.avg("price")?;
    assert_eq!(sum, json!(700));
    assert_eq!(count, 3);
    // avg == sum / count within the configured precision
    assert_eq!(avg, json!(233.33));
    assert_eq!(results.min("price")?, json!(100));
    assert_eq!(results.max("price")?, json!(300));
    Ok(())
}
