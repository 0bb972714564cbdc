//! Format adapters: the narrow contract the engine consumes.
//!
//! A source produces a lazy sequence of rows for an optional selector (a
//! dotted path naming the row-producing node of the document). Concrete
//! adapters for JSON, CSV and YAML live in this module; anything else is an
//! external adapter implementing [`DataSource`].

mod csv_file;
mod json;
mod yaml;

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

pub use csv_file::CsvSource;
pub use json::JsonSource;
pub use yaml::YamlSource;

use crate::error::{FqlError, FqlResult};

/// Lazy row stream. Errors surface on the row that provoked them; rows
/// already yielded stay valid.
pub type RowStream = Box<dyn Iterator<Item = FqlResult<Value>> + Send>;

pub trait DataSource: Send + Sync {
    /// Produce rows under `selector` (`None` or `"*"` for the document root).
    fn stream_rows(&self, selector: Option<&str>) -> FqlResult<RowStream>;

    /// Human-readable tag, e.g. `[csv](items.csv)`.
    fn source_label(&self) -> String;
}

/// Open a file as a data source, dispatching on the extension.
pub fn open_path(path: &str) -> FqlResult<Arc<dyn DataSource>> {
    let p = Path::new(path);
    if !p.exists() {
        return Err(FqlError::FileNotFound(path.to_string()));
    }
    let ext = p
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "json" => Ok(Arc::new(JsonSource::new(p))),
        "csv" => Ok(Arc::new(CsvSource::new(p))),
        "yaml" | "yml" => Ok(Arc::new(YamlSource::new(p))),
        other => Err(FqlError::InvalidFormat(format!(
            "unsupported file extension '{}' for '{}'",
            other, path
        ))),
    }
}

/// Resolve a selector against a loaded document and fan the node out into
/// rows: sequences yield their elements, mappings their values, a scalar
/// yields itself.
pub(crate) fn select_rows(doc: Value, selector: Option<&str>) -> FqlResult<Vec<Value>> {
    let mut node = doc;
    if let Some(sel) = selector {
        if sel != "*" {
            for segment in sel.split('.') {
                node = match node.get(segment) {
                    Some(v) => v.clone(),
                    None => return Err(FqlError::MissingField(segment.to_string())),
                };
            }
        }
    }
    Ok(match node {
        Value::Array(items) => items,
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        other => vec![other],
    })
}

/// In-process source over prepared rows. Used by tests and by callers that
/// already hold their data.
pub struct MemorySource {
    rows: Vec<Value>,
    label: String,
}

impl MemorySource {
    pub fn new(rows: Vec<Value>) -> Self {
        Self {
            rows,
            label: "[memory](rows)".to_string(),
        }
    }

    pub fn with_label(rows: Vec<Value>, label: impl Into<String>) -> Self {
        Self {
            rows,
            label: label.into(),
        }
    }
}

impl DataSource for MemorySource {
    fn stream_rows(&self, selector: Option<&str>) -> FqlResult<RowStream> {
        let rows = match selector {
            None | Some("*") => self.rows.clone(),
            Some(sel) => select_rows(Value::Array(self.rows.clone()), Some(sel))?,
        };
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn source_label(&self) -> String {
        self.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_rows_array() {
        let doc = json!({"data": {"products": [{"id": 1}, {"id": 2}]}});
        let rows = select_rows(doc, Some("data.products")).unwrap();
        assert_eq!(rows, vec![json!({"id": 1}), json!({"id": 2})]);
    }

    #[test]
    fn test_select_rows_root() {
        let doc = json!([{"id": 1}]);
        assert_eq!(select_rows(doc.clone(), None).unwrap().len(), 1);
        assert_eq!(select_rows(doc, Some("*")).unwrap().len(), 1);
    }

    #[test]
    fn test_select_rows_object_values() {
        let doc = json!({"a": {"id": 1}, "b": {"id": 2}});
        let rows = select_rows(doc, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], json!({"id": 1}));
    }

    #[test]
    fn test_select_rows_missing_selector() {
        let doc = json!({"data": []});
        let err = select_rows(doc, Some("data.products")).unwrap_err();
        assert!(matches!(err, FqlError::MissingField(seg) if seg == "products"));
    }

    #[test]
    fn test_memory_source() {
        let src = MemorySource::new(vec![json!({"id": 1}), json!({"id": 2})]);
        let rows: Vec<_> = src
            .stream_rows(None)
            .unwrap()
            .collect::<FqlResult<Vec<_>>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(src.source_label(), "[memory](rows)");
    }

    #[test]
    fn test_open_path_missing_file() {
        let err = match open_path("/no/such/file.json") {
            Ok(_) => panic!("expected error"),
            Err(e) => e,
        };
        assert!(matches!(err, FqlError::FileNotFound(_)));
    }
}
