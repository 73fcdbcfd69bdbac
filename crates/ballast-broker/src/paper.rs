//! Scripted in-memory broker for tests.
//!
//! Serves a fixed account/position/quote snapshot and answers order
//! submissions from a FIFO script, so failure sequences (retries, partial
//! failures) can be injected deterministically. Never touches the network.

use crate::error::{BrokerError, BrokerResult};
use crate::gateway::{BrokerGateway, OrderAck};
use async_trait::async_trait;
use ballast_core::{AccountSnapshot, OrderSide, Position, Quote};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::VecDeque;

/// One scripted answer to a `submit_notional_order` call.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Accept the order with this broker order id.
    Accept(String),
    /// Reject with this status code and message.
    Reject { status: u16, message: String },
}

/// A submitted order captured for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedOrder {
    pub symbol: String,
    pub amount_usd: Decimal,
    pub side: OrderSide,
}

#[derive(Default)]
struct ScriptState {
    responses: VecDeque<ScriptedResponse>,
    submitted: Vec<SubmittedOrder>,
    next_order_seq: u64,
}

/// In-memory broker with scripted order responses.
pub struct ScriptedBroker {
    account: Mutex<AccountSnapshot>,
    positions: Mutex<Vec<Position>>,
    quote: Mutex<Quote>,
    script: Mutex<ScriptState>,
}

impl ScriptedBroker {
    /// Broker with the given account and positions; quotes default to
    /// a 99.95/100.05 market.
    pub fn new(account: AccountSnapshot, positions: Vec<Position>) -> Self {
        Self {
            account: Mutex::new(account),
            positions: Mutex::new(positions),
            quote: Mutex::new(Quote {
                bid: "99.95".parse().expect("const quote"),
                ask: "100.05".parse().expect("const quote"),
            }),
            script: Mutex::new(ScriptState::default()),
        }
    }

    /// Override the quote served for every symbol.
    pub fn set_quote(&self, quote: Quote) {
        *self.quote.lock() = quote;
    }

    /// Replace the account snapshot.
    pub fn set_account(&self, account: AccountSnapshot) {
        *self.account.lock() = account;
    }

    /// Queue a scripted response for the next unanswered submission.
    pub fn push_response(&self, response: ScriptedResponse) {
        self.script.lock().responses.push_back(response);
    }

    /// Queue `count` rejections with the given status and message.
    pub fn push_rejections(&self, count: usize, status: u16, message: &str) {
        let mut script = self.script.lock();
        for _ in 0..count {
            script.responses.push_back(ScriptedResponse::Reject {
                status,
                message: message.to_string(),
            });
        }
    }

    /// Orders submitted so far, in call order.
    pub fn submitted_orders(&self) -> Vec<SubmittedOrder> {
        self.script.lock().submitted.clone()
    }
}

#[async_trait]
impl BrokerGateway for ScriptedBroker {
    async fn get_account(&self) -> BrokerResult<AccountSnapshot> {
        Ok(self.account.lock().clone())
    }

    async fn get_positions(&self) -> BrokerResult<Vec<Position>> {
        Ok(self.positions.lock().clone())
    }

    async fn get_latest_quote(&self, _symbol: &str) -> BrokerResult<Quote> {
        Ok(*self.quote.lock())
    }

    async fn submit_notional_order(
        &self,
        symbol: &str,
        amount_usd: Decimal,
        side: OrderSide,
    ) -> BrokerResult<OrderAck> {
        let mut script = self.script.lock();
        script.submitted.push(SubmittedOrder {
            symbol: symbol.to_string(),
            amount_usd,
            side,
        });

        // Script exhausted: accept with a sequential id.
        let response = script.responses.pop_front().unwrap_or_else(|| {
            ScriptedResponse::Accept(format!("paper-{}", script.next_order_seq))
        });
        script.next_order_seq += 1;

        match response {
            ScriptedResponse::Accept(order_id) => Ok(OrderAck { order_id }),
            ScriptedResponse::Reject { status, message } => {
                Err(BrokerError::Api { status, message })
            }
        }
    }
}
