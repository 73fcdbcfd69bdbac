//! Logging and metrics for the ballast rebalancing bot.

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::MetricsCollector;
