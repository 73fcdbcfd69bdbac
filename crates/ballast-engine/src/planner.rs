//! Order planning: weight deltas to signed dollar intents.

use crate::config::RebalanceConfig;
use ballast_core::{OrderIntent, PositionSnapshot, TargetAllocation};
use rust_decimal::Decimal;
use tracing::debug;

/// Compute the order intents that move the portfolio to target.
///
/// For each tracked symbol: `amount = (target - current) * portfolio
/// value`; positive buys, negative sells. Amounts with absolute value
/// below `min_trade_usd` are forced to exactly zero. Output is in
/// symbol order and always covers the full target set (zeroed intents
/// included, for traceability in the ledger).
pub fn plan_orders(
    target: &TargetAllocation,
    positions: &PositionSnapshot,
    portfolio_value: Decimal,
    config: &RebalanceConfig,
) -> Vec<OrderIntent> {
    let mut intents = Vec::with_capacity(target.len());

    for (symbol, target_weight) in target.iter() {
        let current_weight = positions.weight(symbol);
        let mut amount = (target_weight - current_weight) * portfolio_value;

        if amount.abs() < config.min_trade_usd {
            amount = Decimal::ZERO;
        }

        debug!(symbol = %symbol, %amount, "Planned order");
        intents.push(OrderIntent::new(symbol.clone(), amount.round_dp(2)));
    }

    intents
}

/// Sell intents, most negative (largest sell) first.
///
/// Sells run before buys so freed cash is available for the buy phase.
pub fn sell_phase(intents: &[OrderIntent]) -> Vec<&OrderIntent> {
    let mut sells: Vec<&OrderIntent> = intents
        .iter()
        .filter(|i| i.amount_usd < Decimal::ZERO)
        .collect();
    sells.sort_by(|a, b| a.amount_usd.cmp(&b.amount_usd));
    sells
}

/// Buy intents, largest buy first.
pub fn buy_phase(intents: &[OrderIntent]) -> Vec<&OrderIntent> {
    let mut buys: Vec<&OrderIntent> = intents
        .iter()
        .filter(|i| i.amount_usd > Decimal::ZERO)
        .collect();
    buys.sort_by(|a, b| b.amount_usd.cmp(&a.amount_usd));
    buys
}
