//! CSV file adapter. The first record is the header row; cell values go
//! through scalar coercion so numeric columns compare numerically.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::{DataSource, RowStream};
use crate::error::{FqlError, FqlResult};
use crate::value::coerce_scalar;

pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DataSource for CsvSource {
    // CSV documents are flat; the selector is ignored.
    fn stream_rows(&self, _selector: Option<&str>) -> FqlResult<RowStream> {
        let mut reader = match csv::Reader::from_path(&self.path) {
            Ok(r) => r,
            Err(e) => {
                return match e.kind() {
                    csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                        Err(FqlError::FileNotFound(self.path.display().to_string()))
                    }
                    _ => Err(FqlError::InvalidFormat(format!(
                        "{}: {}",
                        self.path.display(),
                        e
                    ))),
                }
            }
        };

        let path = self.path.display().to_string();
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| FqlError::InvalidFormat(format!("{}: {}", path, e)))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let rows = reader.into_records().map(move |record| {
            let record =
                record.map_err(|e| FqlError::InvalidFormat(format!("{}: {}", path, e)))?;
            let mut row = Map::new();
            for (header, cell) in headers.iter().zip(record.iter()) {
                row.insert(header.clone(), coerce_scalar(cell));
            }
            Ok(Value::Object(row))
        });
        Ok(Box::new(rows))
    }

    fn source_label(&self) -> String {
        format!("[csv]({})", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_rows_are_coerced() {
        let mut f = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(f, "id,name,price\n1,Apple,3.5\n2,Pear,4\n").unwrap();

        let src = CsvSource::new(f.path());
        let rows: Vec<_> = src
            .stream_rows(None)
            .unwrap()
            .collect::<FqlResult<Vec<_>>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], json!({"id": 1, "name": "Apple", "price": 3.5}));
        assert_eq!(rows[1]["price"], json!(4));
    }

    #[test]
    fn test_missing_file() {
        let src = CsvSource::new("/no/such/file.csv");
        assert!(matches!(
            src.stream_rows(None),
            Err(FqlError::FileNotFound(_))
        ));
    }
}
