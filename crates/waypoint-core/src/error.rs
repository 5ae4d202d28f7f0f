use thiserror::Error;

/// Result type for rule and 404 store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out: {0}")]
    Timeout(String),
    #[error("cache serialization failed: {0}")]
    Serialization(String),
    #[error("cache value is invalid: {0}")]
    InvalidData(String),
    #[error("cache initialization failed: {0}")]
    Initialization(String),
    #[error("cache operation failed: {0}")]
    Operation(String),
    #[error("cache rebuild failed: {0}")]
    Storage(#[from] StorageError),
}

/// A redirect pattern that could not be turned into a matcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("invalid regular expression: {0}")]
    Syntax(String),
    #[error("pattern exceeds the evaluation budget: {0}")]
    BudgetExceeded(String),
}

impl From<regex::Error> for PatternError {
    fn from(err: regex::Error) -> Self {
        match err {
            regex::Error::CompiledTooBig(limit) => {
                PatternError::BudgetExceeded(format!("compiled program exceeds {limit} bytes"))
            }
            other => PatternError::Syntax(other.to_string()),
        }
    }
}
