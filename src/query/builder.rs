//! Fluent builder methods on [`Query`]. Methods that can violate an
//! invariant (alias binding, duplicate finalNames, misplaced ON) return
//! `FqlResult<&mut Self>` so chains compose with `?`.

use std::sync::Arc;

use serde_json::Value;

use super::ast::{
    ActiveCondition, ComparisonOp, Condition, ConditionGroup, ConditionLeaf, JoinKind, JoinSpec,
    LogicalOp, OrderSpec, PendingJoin, Query, SelectedField, SortMode,
};
use crate::error::{FqlError, FqlResult};
use crate::functions::{Arg, FunctionCall};
use crate::results::Results;
use crate::sources::{open_path, DataSource};

impl Query {
    /// Query over an already-open adapter.
    pub fn from_source(source: Arc<dyn DataSource>) -> Self {
        let mut q = Self::new();
        q.source = Some(source);
        q
    }

    /// Query over a file; the adapter is opened at execute time so parsing
    /// never touches the filesystem.
    pub fn from_file(path: &str) -> Self {
        let mut q = Self::new();
        q.source_path = Some(path.to_string());
        q
    }

    pub fn source(&mut self, source: Arc<dyn DataSource>) -> &mut Self {
        self.source = Some(source);
        self
    }

    /// Set the selector naming the row-producing node inside the document.
    pub fn from(&mut self, selector: &str) -> &mut Self {
        self.selector = if selector.is_empty() || selector == "*" {
            None
        } else {
            Some(selector.to_string())
        };
        self
    }

    /// Add plain projections from a comma-separated list.
    pub fn select(&mut self, fields: &str) -> FqlResult<&mut Self> {
        for field in fields.split(',') {
            let field = field.trim();
            if !field.is_empty() {
                self.add_selection(SelectedField::field(field))?;
            }
        }
        Ok(self)
    }

    /// Project every top-level field of each row.
    pub fn select_all(&mut self) -> &mut Self {
        self.selections.clear();
        self
    }

    pub fn distinct(&mut self) -> &mut Self {
        self.distinct = true;
        self
    }

    /// Bind an alias to the most recently added selection, exactly once.
    pub fn alias(&mut self, name: &str) -> FqlResult<&mut Self> {
        if name.is_empty() {
            return Err(FqlError::AliasError("empty alias".to_string()));
        }
        match self.selections.last() {
            None => {
                return Err(FqlError::AliasError(
                    "no selection to alias".to_string(),
                ))
            }
            Some(last) if last.is_alias => {
                return Err(FqlError::AliasError(format!(
                    "selection already aliased as '{}'",
                    last.final_name
                )))
            }
            _ => {}
        }
        if self.selections.iter().any(|s| s.final_name == name) {
            return Err(FqlError::AliasError(format!("duplicate alias '{}'", name)));
        }
        if let Some(last) = self.selections.last_mut() {
            last.final_name = name.to_string();
            last.is_alias = true;
        }
        Ok(self)
    }

    /// Add a function selection; the registry validates name and arity.
    pub fn call(&mut self, name: &str, args: Vec<Arg>) -> FqlResult<&mut Self> {
        let call = FunctionCall::new(name, args)?;
        self.add_selection(SelectedField::call(call))
    }

    fn add_selection(&mut self, field: SelectedField) -> FqlResult<&mut Self> {
        if self.selections.iter().any(|s| s.final_name == field.final_name) {
            return Err(FqlError::AliasError(format!(
                "duplicate field '{}'",
                field.final_name
            )));
        }
        self.selections.push(field);
        Ok(self)
    }

    // --- conditions ---

    pub fn where_(&mut self, field: &str, op: ComparisonOp, value: impl Into<Value>) -> &mut Self {
        self.active = ActiveCondition::Where;
        self.push_leaf(LogicalOp::And, field, op, value.into())
    }

    pub fn having(&mut self, field: &str, op: ComparisonOp, value: impl Into<Value>) -> &mut Self {
        self.active = ActiveCondition::Having;
        self.push_leaf(LogicalOp::And, field, op, value.into())
    }

    pub fn and(&mut self, field: &str, op: ComparisonOp, value: impl Into<Value>) -> &mut Self {
        self.push_leaf(LogicalOp::And, field, op, value.into())
    }

    pub fn or(&mut self, field: &str, op: ComparisonOp, value: impl Into<Value>) -> &mut Self {
        self.push_leaf(LogicalOp::Or, field, op, value.into())
    }

    pub fn xor(&mut self, field: &str, op: ComparisonOp, value: impl Into<Value>) -> &mut Self {
        self.push_leaf(LogicalOp::Xor, field, op, value.into())
    }

    /// Open a nested AND-linked group in the WHERE tree.
    pub fn where_group(&mut self) -> &mut Self {
        self.active = ActiveCondition::Where;
        self.open_group(LogicalOp::And)
    }

    /// Open a nested AND-linked group in the HAVING tree.
    pub fn having_group(&mut self) -> &mut Self {
        self.active = ActiveCondition::Having;
        self.open_group(LogicalOp::And)
    }

    /// Open a nested OR-linked group in the active tree.
    pub fn or_group(&mut self) -> &mut Self {
        self.open_group(LogicalOp::Or)
    }

    pub fn end_group(&mut self) -> FqlResult<&mut Self> {
        let cursor = match self.active {
            ActiveCondition::Where => &mut self.where_cursor,
            ActiveCondition::Having => &mut self.having_cursor,
        };
        if cursor.pop().is_none() {
            return Err(FqlError::UnexpectedValue(
                "end_group without an open group".to_string(),
            ));
        }
        Ok(self)
    }

    fn push_leaf(&mut self, link: LogicalOp, field: &str, op: ComparisonOp, value: Value) -> &mut Self {
        let leaf = ConditionLeaf {
            link,
            field: field.to_string(),
            op,
            value,
        };
        self.push_condition(Condition::Leaf(leaf));
        self
    }

    fn open_group(&mut self, link: LogicalOp) -> &mut Self {
        let idx = self.push_condition(Condition::Group(ConditionGroup {
            link,
            children: Vec::new(),
        }));
        match self.active {
            ActiveCondition::Where => self.where_cursor.push(idx),
            ActiveCondition::Having => self.having_cursor.push(idx),
        }
        self
    }

    fn push_condition(&mut self, child: Condition) -> usize {
        match self.active {
            ActiveCondition::Where => {
                let cursor = self.where_cursor.clone();
                self.where_root.push_at(&cursor, child)
            }
            ActiveCondition::Having => {
                let cursor = self.having_cursor.clone();
                self.having_root.push_at(&cursor, child)
            }
        }
    }

    // --- joins ---

    pub fn inner_join(&mut self, right: Query, alias: Option<&str>) -> &mut Self {
        self.begin_join(right, alias, JoinKind::Inner)
    }

    pub fn left_join(&mut self, right: Query, alias: Option<&str>) -> &mut Self {
        self.begin_join(right, alias, JoinKind::Left)
    }

    fn begin_join(&mut self, right: Query, alias: Option<&str>, kind: JoinKind) -> &mut Self {
        self.pending_join = Some(PendingJoin {
            right: Box::new(right),
            alias: alias.map(|a| a.to_string()),
            kind,
        });
        self
    }

    /// Complete the preceding join with its key condition.
    pub fn on(&mut self, left_key: &str, op: ComparisonOp, right_key: &str) -> FqlResult<&mut Self> {
        let pending = self.pending_join.take().ok_or_else(|| {
            FqlError::JoinError("ON without a preceding join".to_string())
        })?;
        self.joins.push(JoinSpec {
            right: pending.right,
            alias: pending.alias,
            left_key: left_key.to_string(),
            right_key: right_key.to_string(),
            op,
            kind: pending.kind,
        });
        Ok(self)
    }

    // --- grouping, ordering, window ---

    pub fn group_by(&mut self, field: &str) -> &mut Self {
        self.group_by.push(field.to_string());
        self
    }

    pub fn order_by(&mut self, field: &str, mode: SortMode) -> &mut Self {
        self.order_by.push(OrderSpec {
            field: field.to_string(),
            mode,
        });
        self
    }

    pub fn asc(&mut self, field: &str) -> &mut Self {
        self.order_by(field, SortMode::Asc)
    }

    pub fn desc(&mut self, field: &str) -> &mut Self {
        self.order_by(field, SortMode::Desc)
    }

    pub fn limit(&mut self, n: usize) -> &mut Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(&mut self, n: usize) -> &mut Self {
        self.offset = Some(n);
        self
    }

    pub fn limit_offset(&mut self, n: usize, offset: usize) -> &mut Self {
        self.limit = Some(n);
        self.offset = Some(offset);
        self
    }

    // --- function builders ---

    pub fn count(&mut self, field: &str) -> FqlResult<&mut Self> {
        self.call("COUNT", vec![Arg::Field(field.to_string())])
    }

    pub fn sum(&mut self, field: &str) -> FqlResult<&mut Self> {
        self.call("SUM", vec![Arg::Field(field.to_string())])
    }

    pub fn avg(&mut self, field: &str) -> FqlResult<&mut Self> {
        self.call("AVG", vec![Arg::Field(field.to_string())])
    }

    pub fn min(&mut self, field: &str) -> FqlResult<&mut Self> {
        self.call("MIN", vec![Arg::Field(field.to_string())])
    }

    pub fn max(&mut self, field: &str) -> FqlResult<&mut Self> {
        self.call("MAX", vec![Arg::Field(field.to_string())])
    }

    pub fn group_concat(&mut self, field: &str, separator: &str) -> FqlResult<&mut Self> {
        self.call(
            "GROUP_CONCAT",
            vec![
                Arg::Field(field.to_string()),
                Arg::Literal(Value::String(separator.to_string())),
            ],
        )
    }

    pub fn upper(&mut self, field: &str) -> FqlResult<&mut Self> {
        self.call("UPPER", vec![Arg::Field(field.to_string())])
    }

    pub fn lower(&mut self, field: &str) -> FqlResult<&mut Self> {
        self.call("LOWER", vec![Arg::Field(field.to_string())])
    }

    pub fn length(&mut self, field: &str) -> FqlResult<&mut Self> {
        self.call("LENGTH", vec![Arg::Field(field.to_string())])
    }

    pub fn reverse(&mut self, field: &str) -> FqlResult<&mut Self> {
        self.call("REVERSE", vec![Arg::Field(field.to_string())])
    }

    pub fn concat(&mut self, fields: &str) -> FqlResult<&mut Self> {
        self.call("CONCAT", field_args(fields))
    }

    pub fn concat_ws(&mut self, separator: &str, fields: &str) -> FqlResult<&mut Self> {
        let mut args = vec![Arg::Literal(Value::String(separator.to_string()))];
        args.extend(field_args(fields));
        self.call("CONCAT_WS", args)
    }

    pub fn explode(&mut self, field: &str, separator: &str) -> FqlResult<&mut Self> {
        self.call(
            "EXPLODE",
            vec![
                Arg::Field(field.to_string()),
                Arg::Literal(Value::String(separator.to_string())),
            ],
        )
    }

    pub fn implode(&mut self, field: &str, separator: &str) -> FqlResult<&mut Self> {
        self.call(
            "IMPLODE",
            vec![
                Arg::Field(field.to_string()),
                Arg::Literal(Value::String(separator.to_string())),
            ],
        )
    }

    pub fn base64_encode(&mut self, field: &str) -> FqlResult<&mut Self> {
        self.call("BASE64_ENCODE", vec![Arg::Field(field.to_string())])
    }

    pub fn base64_decode(&mut self, field: &str) -> FqlResult<&mut Self> {
        self.call("BASE64_DECODE", vec![Arg::Field(field.to_string())])
    }

    pub fn random_string(&mut self, len: usize) -> FqlResult<&mut Self> {
        self.call("RANDOM_STRING", vec![Arg::Literal(Value::from(len))])
    }

    pub fn random_bytes(&mut self, len: usize) -> FqlResult<&mut Self> {
        self.call("RANDOM_BYTES", vec![Arg::Literal(Value::from(len))])
    }

    pub fn ceil(&mut self, field: &str) -> FqlResult<&mut Self> {
        self.call("CEIL", vec![Arg::Field(field.to_string())])
    }

    pub fn floor(&mut self, field: &str) -> FqlResult<&mut Self> {
        self.call("FLOOR", vec![Arg::Field(field.to_string())])
    }

    pub fn round(&mut self, field: &str, precision: i64) -> FqlResult<&mut Self> {
        self.call(
            "ROUND",
            vec![Arg::Field(field.to_string()), Arg::Literal(Value::from(precision))],
        )
    }

    pub fn modulo(&mut self, field: &str, divisor: i64) -> FqlResult<&mut Self> {
        self.call(
            "MOD",
            vec![Arg::Field(field.to_string()), Arg::Literal(Value::from(divisor))],
        )
    }

    pub fn md5(&mut self, field: &str) -> FqlResult<&mut Self> {
        self.call("MD5", vec![Arg::Field(field.to_string())])
    }

    pub fn sha1(&mut self, field: &str) -> FqlResult<&mut Self> {
        self.call("SHA1", vec![Arg::Field(field.to_string())])
    }

    pub fn coalesce(&mut self, fields: &str) -> FqlResult<&mut Self> {
        self.call("COALESCE", field_args(fields))
    }

    pub fn coalesce_ne(&mut self, fields: &str) -> FqlResult<&mut Self> {
        self.call("COALESCE_NE", field_args(fields))
    }

    // --- execution ---

    /// Consume the builder into a re-iterable result handle. Sources bound
    /// by path are opened here.
    pub fn execute(mut self) -> FqlResult<Results> {
        self.resolve_sources()?;
        Ok(Results::new(self))
    }

    pub(crate) fn resolve_sources(&mut self) -> FqlResult<()> {
        if self.pending_join.is_some() {
            return Err(FqlError::JoinError(
                "join is missing its ON clause".to_string(),
            ));
        }
        if self.source.is_none() {
            let path = self.source_path.clone().ok_or_else(|| {
                FqlError::UnexpectedValue("query has no data source".to_string())
            })?;
            self.source = Some(open_path(&path)?);
        }
        for join in &mut self.joins {
            join.right.resolve_sources()?;
        }
        Ok(())
    }
}

fn field_args(fields: &str) -> Vec<Arg> {
    fields
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| Arg::Field(f.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_alias_binds_to_last_selection() {
        let mut q = Query::new();
        q.select("name").unwrap().alias("label").unwrap();
        assert_eq!(q.selections()[0].final_name, "label");
        assert_eq!(q.selections()[0].origin, "name");
        assert!(q.selections()[0].is_alias);
    }

    #[test]
    fn test_alias_without_selection() {
        let mut q = Query::new();
        assert!(matches!(q.alias("x"), Err(FqlError::AliasError(_))));
    }

    #[test]
    fn test_alias_twice_rejected() {
        let mut q = Query::new();
        q.select("name").unwrap().alias("a").unwrap();
        assert!(matches!(q.alias("b"), Err(FqlError::AliasError(_))));
    }

    #[test]
    fn test_empty_alias_rejected() {
        let mut q = Query::new();
        q.select("name").unwrap();
        assert!(matches!(q.alias(""), Err(FqlError::AliasError(_))));
    }

    #[test]
    fn test_duplicate_final_name_rejected() {
        let mut q = Query::new();
        q.select("name").unwrap();
        assert!(matches!(q.select("name"), Err(FqlError::AliasError(_))));

        let mut q = Query::new();
        q.select("a").unwrap().alias("name").unwrap();
        assert!(matches!(q.select("name"), Err(FqlError::AliasError(_))));
    }

    #[test]
    fn test_on_without_join() {
        let mut q = Query::new();
        assert!(matches!(
            q.on("id", ComparisonOp::Eq, "user_id"),
            Err(FqlError::JoinError(_))
        ));
    }

    #[test]
    fn test_join_then_on() {
        let mut q = Query::new();
        q.inner_join(Query::new(), Some("o"))
            .on("id", ComparisonOp::Eq, "user_id")
            .unwrap();
        assert_eq!(q.joins.len(), 1);
        assert_eq!(q.joins[0].alias.as_deref(), Some("o"));
        assert_eq!(q.joins[0].left_key, "id");
    }

    #[test]
    fn test_execute_rejects_dangling_join() {
        let mut q = Query::from_source(std::sync::Arc::new(
            crate::sources::MemorySource::new(vec![]),
        ));
        q.inner_join(Query::new(), None);
        assert!(matches!(q.execute(), Err(FqlError::JoinError(_))));
    }

    #[test]
    fn test_nested_groups() {
        let mut q = Query::new();
        q.where_("a", ComparisonOp::Eq, json!(1))
            .where_group()
            .or("b", ComparisonOp::Eq, json!(2))
            .or("c", ComparisonOp::Eq, json!(3));
        q.end_group().unwrap();
        q.and("d", ComparisonOp::Eq, json!(4));

        assert_eq!(q.where_root.children.len(), 3);
        assert!(matches!(q.where_root.children[1], Condition::Group(_)));
        assert!(q.end_group().is_err());
    }

    #[test]
    fn test_having_chain_targets_having_tree() {
        let mut q = Query::new();
        q.where_("price", ComparisonOp::Gt, json!(10))
            .having("total", ComparisonOp::Gt, json!(500))
            .and("total", ComparisonOp::Lt, json!(1000));
        assert_eq!(q.where_root.children.len(), 1);
        assert_eq!(q.having_root.children.len(), 2);
    }

    #[test]
    fn test_function_builder_arity_checked() {
        let mut q = Query::new();
        assert!(q.upper("name").is_ok());
        assert!(q.call("UPPER", vec![]).is_err());
        assert!(q.call("NO_SUCH", vec![]).is_err());
    }
}
