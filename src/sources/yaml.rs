//! YAML file adapter. Documents deserialize straight into JSON values, so
//! selector resolution and row fan-out are shared with the JSON adapter.

use std::path::{Path, PathBuf};

use serde_json::Value;

use super::json::read_file;
use super::{select_rows, DataSource, RowStream};
use crate::error::{FqlError, FqlResult};

pub struct YamlSource {
    path: PathBuf,
}

impl YamlSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn load(&self) -> FqlResult<Value> {
        let text = read_file(&self.path)?;
        serde_yaml::from_str(&text)
            .map_err(|e| FqlError::InvalidFormat(format!("{}: {}", self.path.display(), e)))
    }
}

impl DataSource for YamlSource {
    fn stream_rows(&self, selector: Option<&str>) -> FqlResult<RowStream> {
        let rows = select_rows(self.load()?, selector)?;
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn source_label(&self) -> String {
        format!("[yaml]({})", self.path.display())
    }
}
