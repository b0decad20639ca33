//! Error types shared across the library

use thiserror::Error;

/// Library-wide error type
#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PredictError {
    pub fn storage(msg: impl Into<String>) -> Self {
        PredictError::Storage(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        PredictError::Parse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        PredictError::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        PredictError::Internal(msg.into())
    }
}

impl From<serde_json::Error> for PredictError {
    fn from(err: serde_json::Error) -> Self {
        PredictError::Parse(err.to_string())
    }
}

/// Result type alias for library operations
pub type PredictResult<T> = Result<T, PredictError>;
