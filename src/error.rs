use thiserror::Error;

pub type Result<T> = std::result::Result<T, TargetingError>;

#[derive(Debug, Error)]
pub enum TargetingError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid structure: {0}")]
    InvalidStructure(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    #[error("failed to decode document with {0:?}")]
    Document(#[from] serde_json::Error),
}
