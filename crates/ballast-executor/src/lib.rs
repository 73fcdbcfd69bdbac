//! Order execution for the ballast rebalancing bot.
//!
//! One notional market order at a time, with exponential-backoff retry
//! and substring-based broker error classification.

pub mod classify;
pub mod executor;

pub use classify::is_retryable_error;
pub use executor::OrderExecutor;
