//! Broker error types.
//!
//! The `Display` text of these errors is what the executor's classifier
//! matches against, so API errors must surface the HTTP status code and
//! the broker's message verbatim.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// Broker rejected the request (auth, insufficient funds, market
    /// closed, invalid symbol, rate limit, 5xx).
    #[error("broker API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure (connection, timeout, DNS).
    #[error("broker request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Missing or unusable credentials.
    #[error("broker authentication error: {0}")]
    Auth(String),

    /// Response body could not be decoded.
    #[error("broker response decode error: {0}")]
    Decode(String),
}

pub type BrokerResult<T> = Result<T, BrokerError>;
