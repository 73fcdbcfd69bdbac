//! Drift detection and rebalance planning.
//!
//! Pure computation over core types:
//! - `calculate_drift`: current vs. target weights
//! - `needs_rebalancing`: cooldown-then-threshold decision with a reason
//! - `plan_orders`: signed dollar intents with min-trade filtering
//! - phase ordering helpers (sells largest-first, buys largest-first)

pub mod config;
pub mod drift;
pub mod planner;

pub use config::RebalanceConfig;
pub use drift::{calculate_drift, needs_rebalancing, RebalanceDecision};
pub use planner::{buy_phase, plan_orders, sell_phase};
