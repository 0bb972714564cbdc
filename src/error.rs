use thiserror::Error;

#[derive(Error, Debug)]
pub enum FqlError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Alias error: {0}")]
    AliasError(String),

    #[error("Join error: {0}")]
    JoinError(String),

    #[error("Sort error: {0}")]
    SortError(String),

    #[error("Field '{0}' not found")]
    MissingField(String),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Unexpected value: {0}")]
    UnexpectedValue(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type FqlResult<T> = Result<T, FqlError>;
