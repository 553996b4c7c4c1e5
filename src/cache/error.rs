use crate::error::{AppError, InfrastructureError};
use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    ConnectionError(String),

    #[error("Cache command failed: {0}")]
    CommandError(String),

    #[error("Cache serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[cfg(feature = "cache")]
impl From<::redis::RedisError> for CacheError {
    fn from(e: ::redis::RedisError) -> Self {
        CacheError::CommandError(e.to_string())
    }
}

#[cfg(feature = "cache")]
impl From<bb8::RunError<::redis::RedisError>> for CacheError {
    fn from(e: bb8::RunError<::redis::RedisError>) -> Self {
        CacheError::ConnectionError(e.to_string())
    }
}

impl From<CacheError> for AppError {
    fn from(e: CacheError) -> Self {
        AppError::infrastructure(InfrastructureError::StatusStore {
            message: e.to_string(),
        })
    }
}
