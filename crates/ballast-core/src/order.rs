//! Order intents and execution results.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Static string form, matching the wire format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of a single order execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Success,
    Failed,
    Retrying,
    Skipped,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Retrying => write!(f, "retrying"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// A planned order: signed dollar amount for one symbol.
///
/// Positive amounts buy, negative amounts sell. A zero amount means
/// "no action" and must never reach the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntent {
    /// Instrument symbol (e.g., "VTI").
    pub symbol: String,
    /// Signed notional amount in USD.
    pub amount_usd: Decimal,
}

impl OrderIntent {
    /// Create a new order intent.
    pub fn new(symbol: impl Into<String>, amount_usd: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            amount_usd,
        }
    }

    /// The side this intent executes on, or `None` for a zero amount.
    pub fn side(&self) -> Option<OrderSide> {
        if self.amount_usd > Decimal::ZERO {
            Some(OrderSide::Buy)
        } else if self.amount_usd < Decimal::ZERO {
            Some(OrderSide::Sell)
        } else {
            None
        }
    }

    /// Unsigned notional amount in USD.
    pub fn abs_amount(&self) -> Decimal {
        self.amount_usd.abs()
    }
}

/// Result of a single order execution, immutable once returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    /// Instrument symbol.
    pub symbol: String,
    /// Side executed.
    pub side: OrderSide,
    /// Unsigned notional amount in USD.
    pub amount_usd: Decimal,
    /// Terminal status.
    pub status: OrderStatus,
    /// Broker order id, present on success.
    pub order_id: Option<String>,
    /// Last error text, present on failure.
    pub error_message: Option<String>,
    /// Retries actually consumed (see executor contract for the
    /// non-retryable reporting convention).
    pub retry_count: u32,
}

impl OrderResult {
    /// True if the order executed successfully.
    pub fn is_success(&self) -> bool {
        self.status == OrderStatus::Success
    }
}
