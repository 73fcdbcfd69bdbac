//! The broker capability consumed by the orchestration core.

use crate::error::BrokerResult;
use async_trait::async_trait;
use ballast_core::{AccountSnapshot, OrderSide, Position, Quote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Acknowledgement for a submitted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Broker-assigned order id.
    pub order_id: String,
}

/// Capability contract for a single-account notional-order broker.
///
/// The core treats this as a black box: one account, dollar-denominated
/// market orders, per-symbol positions and quotes.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Fetch the current account snapshot.
    async fn get_account(&self) -> BrokerResult<AccountSnapshot>;

    /// Fetch all open positions.
    async fn get_positions(&self) -> BrokerResult<Vec<Position>>;

    /// Fetch the latest bid/ask for a symbol.
    async fn get_latest_quote(&self, symbol: &str) -> BrokerResult<Quote>;

    /// Submit a notional (dollar-denominated) market order.
    ///
    /// `amount_usd` is unsigned; `side` encodes direction.
    async fn submit_notional_order(
        &self,
        symbol: &str,
        amount_usd: Decimal,
        side: OrderSide,
    ) -> BrokerResult<OrderAck>;
}
