//! Logical query model: operators, selections, condition trees, joins and
//! orderings, plus the condition evaluator.

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FqlError, FqlResult};
use crate::functions::{FunctionCall, FunctionKind};
use crate::path::get_path;
use crate::sources::DataSource;
use crate::value::{compare_values, values_equal};

/// Guard against pathological LIKE patterns.
const MAX_LIKE_PATTERN_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    NotLike,
    In,
    NotIn,
    Is,
    IsNot,
}

impl ComparisonOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::NotEq => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::LtEq => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::GtEq => ">=",
            ComparisonOp::Like => "LIKE",
            ComparisonOp::NotLike => "NOT LIKE",
            ComparisonOp::In => "IN",
            ComparisonOp::NotIn => "NOT IN",
            ComparisonOp::Is => "IS",
            ComparisonOp::IsNot => "IS NOT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Xor,
}

impl LogicalOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
            LogicalOp::Xor => "XOR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortMode {
    Asc,
    Desc,
    Natsort,
    Shuffle,
}

impl SortMode {
    pub fn parse(word: &str) -> FqlResult<Self> {
        match word.to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortMode::Asc),
            "DESC" => Ok(SortMode::Desc),
            "NATSORT" => Ok(SortMode::Natsort),
            "SHUFFLE" => Ok(SortMode::Shuffle),
            other => Err(FqlError::SortError(format!("unknown sort mode '{}'", other))),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortMode::Asc => "ASC",
            SortMode::Desc => "DESC",
            SortMode::Natsort => "NATSORT",
            SortMode::Shuffle => "SHUFFLE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
}

/// One projection entry. `final_name` is the alias when present, otherwise
/// the raw origin expression, and is unique within a query.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedField {
    pub final_name: String,
    pub origin: String,
    pub is_alias: bool,
    pub function: Option<FunctionCall>,
}

impl SelectedField {
    pub fn field(origin: &str) -> Self {
        Self {
            final_name: origin.to_string(),
            origin: origin.to_string(),
            is_alias: false,
            function: None,
        }
    }

    pub fn call(call: FunctionCall) -> Self {
        let rendered = call.to_sql();
        Self {
            final_name: rendered.clone(),
            origin: rendered,
            is_alias: false,
            function: Some(call),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        self.function
            .as_ref()
            .is_some_and(|c| c.kind() == FunctionKind::Aggregate)
    }
}

/// Ordering entry; later entries act as secondary sort keys.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    pub field: String,
    pub mode: SortMode,
}

/// A join against another query. A bare data source joins as a select-all
/// query over that source.
#[derive(Clone)]
pub struct JoinSpec {
    pub right: Box<Query>,
    pub alias: Option<String>,
    pub left_key: String,
    pub right_key: String,
    pub op: ComparisonOp,
    pub kind: JoinKind,
}

impl std::fmt::Debug for JoinSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinSpec")
            .field("alias", &self.alias)
            .field("left_key", &self.left_key)
            .field("right_key", &self.right_key)
            .field("op", &self.op)
            .field("kind", &self.kind)
            .finish()
    }
}

/// A join call awaiting its ON clause.
#[derive(Clone)]
pub(crate) struct PendingJoin {
    pub right: Box<Query>,
    pub alias: Option<String>,
    pub kind: JoinKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionLeaf {
    pub link: LogicalOp,
    pub field: String,
    pub op: ComparisonOp,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConditionGroup {
    pub link: LogicalOp,
    pub children: Vec<Condition>,
}

impl Default for LogicalOp {
    fn default() -> Self {
        LogicalOp::And
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Leaf(ConditionLeaf),
    Group(ConditionGroup),
}

impl Condition {
    fn link(&self) -> LogicalOp {
        match self {
            Condition::Leaf(l) => l.link,
            Condition::Group(g) => g.link,
        }
    }

    fn evaluate(&self, row: &Value, strict_paths: bool) -> FqlResult<bool> {
        match self {
            Condition::Leaf(l) => evaluate_leaf(l, row, strict_paths),
            Condition::Group(g) => g.evaluate(row, strict_paths),
        }
    }

    fn evaluate_projected(&self, row: &Value) -> FqlResult<bool> {
        match self {
            Condition::Leaf(l) => {
                // HAVING only sees projected finalNames.
                if row.get(&l.field).is_none() {
                    return Err(FqlError::MissingField(l.field.clone()));
                }
                evaluate_leaf(l, row, false)
            }
            Condition::Group(g) => g.evaluate_projected(row),
        }
    }
}

impl ConditionGroup {
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Left-associative fold. The first child's link is the group identity;
    /// AND skips the child once the accumulator is false, OR once it is
    /// true, XOR always evaluates. An empty group is true.
    pub fn evaluate(&self, row: &Value, strict_paths: bool) -> FqlResult<bool> {
        self.fold(|child| child.evaluate(row, strict_paths))
    }

    /// HAVING variant: every referenced field must be a projected finalName.
    pub fn evaluate_projected(&self, row: &Value) -> FqlResult<bool> {
        self.fold(|child| child.evaluate_projected(row))
    }

    /// Append `child` inside the group addressed by `cursor` (a path of
    /// child indices into nested groups) and return its index there. A
    /// stale cursor segment falls back to the deepest valid level.
    pub(crate) fn push_at(&mut self, cursor: &[usize], child: Condition) -> usize {
        match cursor.split_first() {
            None => {
                self.children.push(child);
                self.children.len() - 1
            }
            Some((&idx, rest)) => {
                if let Some(Condition::Group(group)) = self.children.get_mut(idx) {
                    group.push_at(rest, child)
                } else {
                    self.children.push(child);
                    self.children.len() - 1
                }
            }
        }
    }

    fn fold(&self, mut eval: impl FnMut(&Condition) -> FqlResult<bool>) -> FqlResult<bool> {
        let mut acc = true;
        for (i, child) in self.children.iter().enumerate() {
            let link = if i == 0 { LogicalOp::And } else { child.link() };
            match link {
                LogicalOp::And => {
                    if acc {
                        acc = eval(child)?;
                    }
                }
                LogicalOp::Or => {
                    if !acc {
                        acc = eval(child)?;
                    }
                }
                LogicalOp::Xor => {
                    acc = acc != eval(child)?;
                }
            }
        }
        Ok(acc)
    }
}

fn evaluate_leaf(leaf: &ConditionLeaf, row: &Value, strict_paths: bool) -> FqlResult<bool> {
    let actual = get_path(row, &leaf.field, strict_paths)?;

    match leaf.op {
        ComparisonOp::Is => {
            return Ok(if leaf.value.is_null() {
                actual.is_null()
            } else {
                values_equal(&actual, &leaf.value)
            });
        }
        ComparisonOp::IsNot => {
            return Ok(if leaf.value.is_null() {
                !actual.is_null()
            } else {
                !values_equal(&actual, &leaf.value)
            });
        }
        _ => {}
    }

    // A missing or null field never satisfies an ordinary comparison.
    if actual.is_null() {
        return Ok(false);
    }

    Ok(match leaf.op {
        ComparisonOp::Eq => values_equal(&actual, &leaf.value),
        ComparisonOp::NotEq => !values_equal(&actual, &leaf.value),
        ComparisonOp::Lt => compare_values(&actual, &leaf.value) == std::cmp::Ordering::Less,
        ComparisonOp::LtEq => compare_values(&actual, &leaf.value) != std::cmp::Ordering::Greater,
        ComparisonOp::Gt => compare_values(&actual, &leaf.value) == std::cmp::Ordering::Greater,
        ComparisonOp::GtEq => compare_values(&actual, &leaf.value) != std::cmp::Ordering::Less,
        ComparisonOp::Like => like_matches(&actual, &leaf.value)?,
        ComparisonOp::NotLike => !like_matches(&actual, &leaf.value)?,
        ComparisonOp::In => in_sequence(&actual, &leaf.value)?,
        ComparisonOp::NotIn => !in_sequence(&actual, &leaf.value)?,
        // Handled before the null check.
        ComparisonOp::Is | ComparisonOp::IsNot => false,
    })
}

fn in_sequence(actual: &Value, candidates: &Value) -> FqlResult<bool> {
    match candidates {
        Value::Array(items) => Ok(items.iter().any(|v| values_equal(actual, v))),
        other => Err(FqlError::TypeError(format!(
            "IN requires a sequence value, got {}",
            crate::value::to_plain_string(other)
        ))),
    }
}

/// SQL wildcard match: `%` any run, `_` one character, `\` escapes both and
/// itself; everything else matches literally, anchored at both ends.
fn like_matches(actual: &Value, pattern: &Value) -> FqlResult<bool> {
    let text = crate::value::to_plain_string(actual);
    let pattern = crate::value::to_plain_string(pattern);
    let re = like_to_regex(&pattern)?;
    Ok(re.is_match(&text))
}

pub(crate) fn like_to_regex(pattern: &str) -> FqlResult<Regex> {
    if pattern.len() > MAX_LIKE_PATTERN_LEN {
        return Err(FqlError::UnexpectedValue(format!(
            "LIKE pattern too long: {} bytes",
            pattern.len()
        )));
    }
    let mut re = String::with_capacity(pattern.len() + 2);
    re.push('^');
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => re.push_str(&regex::escape(&escaped.to_string())),
                None => re.push_str(&regex::escape("\\")),
            },
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| FqlError::UnexpectedValue(format!("LIKE pattern: {}", e)))
}

/// Which condition tree the fluent chain is currently extending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActiveCondition {
    Where,
    Having,
}

/// The logical query: projections, source, condition trees, joins, grouping,
/// ordering and window. Mutable while building, consumed by `execute`.
#[derive(Clone)]
pub struct Query {
    pub(crate) source: Option<Arc<dyn DataSource>>,
    pub(crate) source_path: Option<String>,
    pub(crate) selector: Option<String>,
    pub(crate) selections: Vec<SelectedField>,
    pub(crate) distinct: bool,
    pub(crate) where_root: ConditionGroup,
    pub(crate) having_root: ConditionGroup,
    pub(crate) joins: Vec<JoinSpec>,
    pub(crate) group_by: Vec<String>,
    pub(crate) order_by: Vec<OrderSpec>,
    pub(crate) limit: Option<usize>,
    pub(crate) offset: Option<usize>,

    pub(crate) pending_join: Option<PendingJoin>,
    pub(crate) active: ActiveCondition,
    pub(crate) where_cursor: Vec<usize>,
    pub(crate) having_cursor: Vec<usize>,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Query {
    pub fn new() -> Self {
        Self {
            source: None,
            source_path: None,
            selector: None,
            selections: Vec::new(),
            distinct: false,
            where_root: ConditionGroup::default(),
            having_root: ConditionGroup::default(),
            joins: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            pending_join: None,
            active: ActiveCondition::Where,
            where_cursor: Vec::new(),
            having_cursor: Vec::new(),
        }
    }

    pub fn selections(&self) -> &[SelectedField] {
        &self.selections
    }

    /// Aggregation kicks in with GROUP BY or any aggregate selection.
    pub(crate) fn is_grouped(&self) -> bool {
        !self.group_by.is_empty() || self.selections.iter().any(|s| s.is_aggregate())
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query").field("sql", &self.to_sql()).finish()
    }
}
