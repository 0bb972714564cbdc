//! Re-iterable result handle. Iteration rebuilds the pipeline; the
//! aggregate helpers (`count`, `sum`, `avg`, `min`, `max`) walk it once and
//! memoize per field.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{FqlError, FqlResult};
use crate::executor;
use crate::functions::{aggregate, Arg, FunctionCall};
use crate::query::Query;
use crate::sources::RowStream;

pub struct Results {
    query: Query,
    count_cache: Option<usize>,
    aggregate_cache: HashMap<String, Value>,
}

impl Results {
    pub(crate) fn new(query: Query) -> Self {
        Self {
            query,
            count_cache: None,
            aggregate_cache: HashMap::new(),
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Fresh lazy iterator over the result rows. Each call re-runs the
    /// pipeline from the source.
    pub fn iter(&self) -> FqlResult<RowStream> {
        executor::run(&self.query)
    }

    pub fn fetch_all(&self) -> FqlResult<Vec<Value>> {
        self.iter()?.collect()
    }

    /// First row, or `None` on an empty result.
    pub fn fetch(&self) -> FqlResult<Option<Value>> {
        self.iter()?.next().transpose()
    }

    /// `field` from the first row. The row exposes only projected
    /// finalNames, so asking for an unprojected field is an error.
    pub fn fetch_single(&self, field: &str) -> FqlResult<Value> {
        match self.fetch()? {
            Some(row) => row
                .get(field)
                .cloned()
                .ok_or_else(|| FqlError::MissingField(field.to_string())),
            None => Err(FqlError::MissingField(field.to_string())),
        }
    }

    pub fn count(&mut self) -> FqlResult<usize> {
        if let Some(count) = self.count_cache {
            return Ok(count);
        }
        let mut count = 0;
        for row in self.iter()? {
            row?;
            count += 1;
        }
        self.count_cache = Some(count);
        Ok(count)
    }

    pub fn exists(&mut self) -> FqlResult<bool> {
        Ok(self.count()? > 0)
    }

    pub fn sum(&mut self, field: &str) -> FqlResult<Value> {
        self.aggregate("SUM", field, None)
    }

    /// Average with the default two decimal places.
    pub fn avg(&mut self, field: &str) -> FqlResult<Value> {
        self.aggregate("AVG", field, None)
    }

    pub fn avg_with_decimals(&mut self, field: &str, decimals: u32) -> FqlResult<Value> {
        self.aggregate("AVG", field, Some(decimals))
    }

    pub fn min(&mut self, field: &str) -> FqlResult<Value> {
        self.aggregate("MIN", field, None)
    }

    pub fn max(&mut self, field: &str) -> FqlResult<Value> {
        self.aggregate("MAX", field, None)
    }

    fn aggregate(&mut self, name: &str, field: &str, decimals: Option<u32>) -> FqlResult<Value> {
        let cache_key = match decimals {
            Some(d) => format!("{}:{}:{}", name, field, d),
            None => format!("{}:{}", name, field),
        };
        if let Some(value) = self.aggregate_cache.get(&cache_key) {
            return Ok(value.clone());
        }

        let mut args = vec![Arg::Field(field.to_string())];
        if let Some(d) = decimals {
            args.push(Arg::Literal(Value::from(d)));
        }
        let call = FunctionCall::new(name, args)?;
        let rows = self.fetch_all()?;
        let value = aggregate::evaluate(&call, &rows)?;

        if self.count_cache.is_none() {
            self.count_cache = Some(rows.len());
        }
        self.aggregate_cache.insert(cache_key, value.clone());
        Ok(value)
    }
}

impl std::fmt::Debug for Results {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Results")
            .field("query", &self.query)
            .finish()
    }
}
