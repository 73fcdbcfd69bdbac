//! Error types for ballast-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid allocation: {0}")]
    InvalidAllocation(String),

    #[error("Invalid order amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
