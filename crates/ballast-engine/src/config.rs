//! Rebalancing configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Rebalancing decision and execution parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceConfig {
    /// Absolute drift that makes a symbol eligible for rebalancing
    /// (0.05 = 5 percentage points). Comparison is strict: drift must
    /// exceed the threshold. Default: 0.05.
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: Decimal,
    /// Minimum whole days between rebalances. Cooldown is checked before
    /// drift and suppresses rebalancing regardless of magnitude.
    /// Default: 30.
    #[serde(default = "default_min_days_between")]
    pub min_days_between: i64,
    /// Orders below this absolute dollar amount are forced to zero.
    /// Default: 10.0.
    #[serde(default = "default_min_trade_usd")]
    pub min_trade_usd: Decimal,
    /// Per-order retry budget for the executor. Default: 3.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_drift_threshold() -> Decimal {
    "0.05".parse().expect("const default")
}

fn default_min_days_between() -> i64 {
    30
}

fn default_min_trade_usd() -> Decimal {
    "10.0".parse().expect("const default")
}

fn default_max_retries() -> u32 {
    3
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            drift_threshold: default_drift_threshold(),
            min_days_between: default_min_days_between(),
            min_trade_usd: default_min_trade_usd(),
            max_retries: default_max_retries(),
        }
    }
}
