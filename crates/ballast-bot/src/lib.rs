//! Ballast: automated portfolio rebalancing bot.
//!
//! Composition root and CLI. Detects drift from a target allocation,
//! executes a sell-then-buy rebalance with retries, and records every
//! attempt in a durable transaction ledger.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod report;

pub use config::{AppConfig, StorageConfig};
pub use error::{AppError, AppResult};
pub use orchestrator::RebalanceOrchestrator;
pub use report::PerformanceReport;
