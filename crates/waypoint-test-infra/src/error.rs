use std::result::Result as StdResult;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TestInfraError {
    #[error("Container error: {0}")]
    Container(#[from] testcontainers::TestcontainersError),

    #[error("Database not ready after {attempts} attempts: {source}")]
    NotReady { attempts: u32, source: sqlx::Error },
}

pub type Result<T> = StdResult<T, TestInfraError>;
