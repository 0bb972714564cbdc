//! JSON file adapter.

use std::path::{Path, PathBuf};

use serde_json::Value;

use super::{select_rows, DataSource, RowStream};
use crate::error::{FqlError, FqlResult};

pub struct JsonSource {
    path: PathBuf,
}

impl JsonSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn load(&self) -> FqlResult<Value> {
        let text = read_file(&self.path)?;
        serde_json::from_str(&text).map_err(|e| {
            FqlError::InvalidFormat(format!("{}: {}", self.path.display(), e))
        })
    }
}

impl DataSource for JsonSource {
    fn stream_rows(&self, selector: Option<&str>) -> FqlResult<RowStream> {
        let rows = select_rows(self.load()?, selector)?;
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn source_label(&self) -> String {
        format!("[json]({})", self.path.display())
    }
}

pub(super) fn read_file(path: &Path) -> FqlResult<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(FqlError::FileNotFound(path.display().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}
