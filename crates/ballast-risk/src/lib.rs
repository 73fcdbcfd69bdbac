//! Pre-flight risk checks for rebalancing.
//!
//! The circuit breaker halts a daily check outright when the account
//! shows a large single-day loss, before any drift computation or order
//! planning happens.

pub mod circuit_breaker;

pub use circuit_breaker::{BreakerVerdict, CircuitBreaker, RiskConfig};
