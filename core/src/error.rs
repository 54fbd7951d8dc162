//! Core error types for the DQ monitor service

use thiserror::Error;

/// Core error type for all operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Dataset '{0}' not found")]
    DatasetNotFound(String),

    #[error("No headers found for dataset '{0}'")]
    NoHeaders(String),

    #[error("No data found for the selected time range (last {days} days)")]
    NoData { days: i32 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;
