//! Broker-facing account, position, and quote snapshots.

use crate::order::OrderSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Point-in-time account snapshot from the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Available cash in USD.
    pub cash: Decimal,
    /// Current account equity.
    pub equity: Decimal,
    /// Equity at the previous trading day's close.
    pub last_equity: Decimal,
    /// Total portfolio value (cash + positions).
    pub portfolio_value: Decimal,
}

/// A single open position reported by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Instrument symbol.
    pub symbol: String,
    /// Current market value in USD.
    pub market_value: Decimal,
}

/// Latest bid/ask for a symbol.
///
/// Used only to obtain a reference price for observability; orders are
/// notional (dollar-denominated), never share-count-denominated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: Decimal,
    pub ask: Decimal,
}

impl Quote {
    /// Reference price for a given side: ask for buys, bid for sells.
    pub fn reference_price(&self, side: OrderSide) -> Decimal {
        match side {
            OrderSide::Buy => self.ask,
            OrderSide::Sell => self.bid,
        }
    }
}
