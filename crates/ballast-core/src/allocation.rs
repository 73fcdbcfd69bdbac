//! Target allocation, position weights, and drift.
//!
//! All three maps are keyed by symbol and ordered (BTreeMap) so that
//! logs, plans, and ledger records are deterministic.

use crate::account::Position;
use crate::error::{CoreError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tolerance on the sum of target weights: 1.0 +/- this value.
pub const ALLOCATION_SUM_TOLERANCE: &str = "0.001";

fn sum_tolerance() -> Decimal {
    ALLOCATION_SUM_TOLERANCE.parse().expect("const tolerance")
}

/// Target portfolio allocation: symbol -> weight in [0, 1].
///
/// Immutable for the duration of a rebalance decision; loaded once per
/// process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetAllocation(BTreeMap<String, Decimal>);

impl TargetAllocation {
    /// Validate and construct a target allocation.
    ///
    /// Weights must each be in [0, 1] and sum to 1.0 within
    /// [`ALLOCATION_SUM_TOLERANCE`].
    pub fn new(weights: BTreeMap<String, Decimal>) -> Result<Self> {
        if weights.is_empty() {
            return Err(CoreError::InvalidAllocation(
                "allocation must not be empty".to_string(),
            ));
        }
        for (symbol, weight) in &weights {
            if *weight < Decimal::ZERO || *weight > Decimal::ONE {
                return Err(CoreError::InvalidAllocation(format!(
                    "weight for {} out of range: {}",
                    symbol, weight
                )));
            }
        }
        let total: Decimal = weights.values().sum();
        if (total - Decimal::ONE).abs() > sum_tolerance() {
            return Err(CoreError::InvalidAllocation(format!(
                "allocation must sum to 1.0, got {}",
                total
            )));
        }
        Ok(Self(weights))
    }

    /// Target weight for a symbol, zero if untracked.
    pub fn weight(&self, symbol: &str) -> Decimal {
        self.0.get(symbol).copied().unwrap_or(Decimal::ZERO)
    }

    /// Iterate symbols and weights in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Decimal)> {
        self.0.iter()
    }

    /// Tracked symbols in order.
    pub fn symbols(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Number of tracked symbols.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no symbols are tracked (unreachable after `new`).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Current portfolio weights: symbol -> weight in [0, 1].
///
/// Ephemeral; recomputed on every drift check, never persisted. Symbols
/// tracked by the target allocation but absent from the broker appear
/// with weight 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionSnapshot(BTreeMap<String, Decimal>);

impl PositionSnapshot {
    /// Derive current weights from broker positions and portfolio value.
    ///
    /// A zero or negative portfolio value is a defined edge case: every
    /// tracked symbol gets weight 0 (all drift becomes -target).
    pub fn from_positions(
        positions: &[Position],
        portfolio_value: Decimal,
        target: &TargetAllocation,
    ) -> Self {
        let mut weights = BTreeMap::new();

        if portfolio_value > Decimal::ZERO {
            for position in positions {
                weights.insert(
                    position.symbol.clone(),
                    position.market_value / portfolio_value,
                );
            }
        }

        // Tracked symbols with no open position are fully underweight.
        for symbol in target.symbols() {
            weights.entry(symbol.clone()).or_insert(Decimal::ZERO);
        }

        Self(weights)
    }

    /// Current weight for a symbol, zero if absent.
    pub fn weight(&self, symbol: &str) -> Decimal {
        self.0.get(symbol).copied().unwrap_or(Decimal::ZERO)
    }

    /// Iterate symbols and weights in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Decimal)> {
        self.0.iter()
    }
}

/// Signed weight deltas: symbol -> (current - target).
///
/// Negative values are underweight, positive overweight. Derived and
/// ephemeral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftVector(BTreeMap<String, Decimal>);

impl DriftVector {
    /// Build from a symbol -> delta map.
    pub fn new(deltas: BTreeMap<String, Decimal>) -> Self {
        Self(deltas)
    }

    /// Drift for a symbol, zero if untracked.
    pub fn drift(&self, symbol: &str) -> Decimal {
        self.0.get(symbol).copied().unwrap_or(Decimal::ZERO)
    }

    /// Largest absolute drift across all symbols.
    pub fn max_abs(&self) -> Decimal {
        self.0
            .values()
            .map(|d| d.abs())
            .max()
            .unwrap_or(Decimal::ZERO)
    }

    /// Iterate symbols and deltas in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Decimal)> {
        self.0.iter()
    }
}
