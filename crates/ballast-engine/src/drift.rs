//! Drift computation and the rebalance decision.

use crate::config::RebalanceConfig;
use ballast_core::{DriftVector, PositionSnapshot, TargetAllocation};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;

/// Outcome of a rebalance check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebalanceDecision {
    /// True when a rebalance should run.
    pub rebalance: bool,
    /// Human-readable explanation for logs and the daily-check summary.
    pub reason: String,
}

/// Compute signed drift (current - target) for every tracked symbol.
///
/// A symbol absent from the broker's positions reads as weight 0, so its
/// drift is exactly `-target_weight` (fully underweight), never an error.
pub fn calculate_drift(target: &TargetAllocation, positions: &PositionSnapshot) -> DriftVector {
    let mut deltas = BTreeMap::new();
    for (symbol, target_weight) in target.iter() {
        let current = positions.weight(symbol);
        deltas.insert(symbol.clone(), current - target_weight);
    }
    DriftVector::new(deltas)
}

/// Decide whether to rebalance.
///
/// Cooldown is checked first: inside the minimum-days window the answer
/// is no regardless of drift magnitude. Outside it, the maximum absolute
/// drift is compared strictly against the threshold; the reason names
/// every symbol above the threshold.
pub fn needs_rebalancing(
    drift: &DriftVector,
    last_rebalance: Option<DateTime<Utc>>,
    config: &RebalanceConfig,
    now: DateTime<Utc>,
) -> RebalanceDecision {
    if let Some(last) = last_rebalance {
        let days_since = (now - last).num_days();
        if days_since < config.min_days_between {
            return RebalanceDecision {
                rebalance: false,
                reason: format!(
                    "only {} days since last rebalance (min: {})",
                    days_since, config.min_days_between
                ),
            };
        }
    }

    let max_abs = drift.max_abs();
    debug!(%max_abs, threshold = %config.drift_threshold, "Drift check");

    if max_abs > config.drift_threshold {
        let triggers: Vec<&str> = drift
            .iter()
            .filter(|(_, d)| d.abs() > config.drift_threshold)
            .map(|(symbol, _)| symbol.as_str())
            .collect();
        return RebalanceDecision {
            rebalance: true,
            reason: format!(
                "drift {:.1}% exceeds threshold {:.1}% ({})",
                max_abs * Decimal::ONE_HUNDRED,
                config.drift_threshold * Decimal::ONE_HUNDRED,
                triggers.join(", ")
            ),
        };
    }

    RebalanceDecision {
        rebalance: false,
        reason: format!(
            "all positions within {:.1}% of target (max drift: {:.1}%)",
            config.drift_threshold * Decimal::ONE_HUNDRED,
            max_abs * Decimal::ONE_HUNDRED
        ),
    }
}
