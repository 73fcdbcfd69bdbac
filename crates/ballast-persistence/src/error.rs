//! Persistence error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The state lock could not be acquired within its timeout.
    ///
    /// Distinguished from plain IO so callers can alert on contention
    /// separately from business-logic failures.
    #[error("could not acquire state lock after {waited_secs}s; another ballast process may be running")]
    LockTimeout { waited_secs: u64 },

    #[error("transaction {0} not found")]
    TransactionNotFound(String),

    #[error("backup integrity check failed for {0}")]
    ChecksumMismatch(String),

    #[error("no backup available for {0}")]
    NoBackup(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;
