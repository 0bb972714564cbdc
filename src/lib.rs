pub mod error;
pub mod executor;
pub mod functions;
pub mod path;
pub mod query;
pub mod results;
pub mod sources;
pub mod sql;
pub mod value;

pub use error::{FqlError, FqlResult};
pub use functions::{Arg, FunctionCall, FunctionKind};
pub use query::{ComparisonOp, JoinKind, LogicalOp, Query, SortMode};
pub use results::Results;
pub use sources::{open_path, CsvSource, DataSource, JsonSource, MemorySource, RowStream, YamlSource};
pub use sql::parse;
