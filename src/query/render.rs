//! Canonical SQL rendering. One clause per line, uppercase keywords,
//! join clauses indented under FROM; the output of a parser-subset query
//! parses back to an equivalent query.

use serde_json::Value;

use super::ast::{Condition, ConditionGroup, JoinKind, Query};
use crate::value::to_plain_string;

impl Query {
    pub fn to_sql(&self) -> String {
        let mut lines: Vec<String> = Vec::new();

        let mut select = String::from("SELECT ");
        if self.distinct {
            select.push_str("DISTINCT ");
        }
        if self.selections.is_empty() {
            select.push('*');
        } else {
            let items = self
                .selections
                .iter()
                .map(|s| {
                    if s.is_alias {
                        format!("{} AS {}", s.origin, s.final_name)
                    } else {
                        s.origin.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            select.push_str(&items);
        }
        lines.push(select);

        lines.push(format!("FROM {}", self.render_from()));

        for join in &self.joins {
            let kind = match join.kind {
                JoinKind::Inner => "INNER JOIN",
                JoinKind::Left => "LEFT JOIN",
            };
            let alias = join
                .alias
                .as_ref()
                .map(|a| format!(" AS {}", a))
                .unwrap_or_default();
            lines.push(format!(
                "  {} {}{} ON {} {} {}",
                kind,
                join.right.render_from(),
                alias,
                join.left_key,
                join.op.as_sql(),
                join.right_key
            ));
        }

        if !self.where_root.is_empty() {
            lines.push(format!("WHERE {}", render_group(&self.where_root)));
        }
        if !self.group_by.is_empty() {
            lines.push(format!("GROUP BY {}", self.group_by.join(", ")));
        }
        if !self.having_root.is_empty() {
            lines.push(format!("HAVING {}", render_group(&self.having_root)));
        }
        if !self.order_by.is_empty() {
            let orderings = self
                .order_by
                .iter()
                .map(|o| format!("{} {}", o.field, o.mode.as_sql()))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("ORDER BY {}", orderings));
        }
        match (self.limit, self.offset) {
            (Some(n), Some(m)) => lines.push(format!("LIMIT {} OFFSET {}", n, m)),
            (Some(n), None) => lines.push(format!("LIMIT {}", n)),
            (None, Some(m)) => lines.push(format!("OFFSET {}", m)),
            (None, None) => {}
        }

        lines.join("\n")
    }

    fn render_from(&self) -> String {
        let label = match (&self.source, &self.source_path) {
            (Some(src), _) => src.source_label(),
            (None, Some(path)) => format!("({})", path),
            (None, None) => String::new(),
        };
        match (label.is_empty(), &self.selector) {
            (false, Some(sel)) => format!("{}.{}", label, sel),
            (false, None) => label,
            (true, Some(sel)) => sel.clone(),
            (true, None) => "*".to_string(),
        }
    }
}

fn render_group(group: &ConditionGroup) -> String {
    let mut out = String::new();
    for (i, child) in group.children.iter().enumerate() {
        let rendered = match child {
            Condition::Leaf(l) => format!(
                "{} {} {}",
                l.field,
                l.op.as_sql(),
                render_literal(&l.value)
            ),
            Condition::Group(g) => format!("({})", render_group(g)),
        };
        if i == 0 {
            out.push_str(&rendered);
        } else {
            let link = match child {
                Condition::Leaf(l) => l.link,
                Condition::Group(g) => g.link,
            };
            out.push_str(&format!(" {} {}", link.as_sql(), rendered));
        }
    }
    out
}

fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::String(s) => format!("'{}'", s),
        Value::Array(items) => format!(
            "({})",
            items
                .iter()
                .map(render_literal)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        other => to_plain_string(other),
    }
}

#[cfg(test)]
mod tests {
    use super::super::ast::{ComparisonOp, SortMode};
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_plain_select() {
        let mut q = Query::from_file("p.json");
        q.select("id, name").unwrap();
        q.from("data.products");
        q.where_("price", ComparisonOp::Gt, json!(100));
        assert_eq!(
            q.to_sql(),
            "SELECT id, name\nFROM (p.json).data.products\nWHERE price > 100"
        );
    }

    #[test]
    fn test_render_select_star_and_window() {
        let mut q = Query::from_file("p.json");
        q.from("items").limit_offset(10, 5);
        assert_eq!(
            q.to_sql(),
            "SELECT *\nFROM (p.json).items\nLIMIT 10 OFFSET 5"
        );
    }

    #[test]
    fn test_render_aggregate_query() {
        let mut q = Query::from_file("p.json");
        q.select("category").unwrap();
        q.sum("price").unwrap().alias("total").unwrap();
        q.from("data.products");
        q.group_by("category");
        q.having("total", ComparisonOp::Gt, json!(500));
        q.order_by("total", SortMode::Desc);
        assert_eq!(
            q.to_sql(),
            "SELECT category, SUM(price) AS total\n\
             FROM (p.json).data.products\n\
             GROUP BY category\n\
             HAVING total > 500\n\
             ORDER BY total DESC"
        );
    }

    #[test]
    fn test_render_join() {
        let mut q = Query::from_file("users.json");
        q.inner_join(Query::from_file("orders.json"), Some("o"))
            .on("id", ComparisonOp::Eq, "user_id")
            .unwrap();
        assert_eq!(
            q.to_sql(),
            "SELECT *\nFROM (users.json)\n  INNER JOIN (orders.json) AS o ON id = user_id"
        );
    }

    #[test]
    fn test_render_literals() {
        let mut q = Query::from_file("p.json");
        q.where_("name", ComparisonOp::Like, json!("A%"))
            .and("status", ComparisonOp::In, json!(["new", "open"]))
            .or("deleted", ComparisonOp::Is, json!(null));
        assert_eq!(
            q.to_sql(),
            "SELECT *\nFROM (p.json)\n\
             WHERE name LIKE 'A%' AND status IN ('new', 'open') OR deleted IS NULL"
        );
    }

    #[test]
    fn test_render_nested_group() {
        let mut q = Query::from_file("p.json");
        q.where_("a", ComparisonOp::Eq, json!(1)).where_group();
        q.and("b", ComparisonOp::Eq, json!(2))
            .or("c", ComparisonOp::Eq, json!(3));
        q.end_group().unwrap();
        assert_eq!(
            q.to_sql(),
            "SELECT *\nFROM (p.json)\nWHERE a = 1 AND (b = 2 OR c = 3)"
        );
    }
}
