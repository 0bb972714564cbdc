//! Logical query model, fluent builder and canonical rendering.

mod ast;
mod builder;
mod render;

pub use ast::{
    ComparisonOp, Condition, ConditionGroup, ConditionLeaf, JoinKind, JoinSpec, LogicalOp,
    OrderSpec, Query, SelectedField, SortMode,
};
