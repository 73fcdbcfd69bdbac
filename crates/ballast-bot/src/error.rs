//! Application-level error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] ballast_core::CoreError),

    #[error(transparent)]
    Broker(#[from] ballast_broker::BrokerError),

    #[error(transparent)]
    Persistence(#[from] ballast_persistence::PersistenceError),

    #[error(transparent)]
    Telemetry(#[from] ballast_telemetry::TelemetryError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
