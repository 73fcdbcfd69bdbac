//! Notional order execution with retry and backoff.

use crate::classify::is_retryable_error;
use ballast_broker::{BrokerGateway, OrderAck};
use ballast_core::{OrderResult, OrderSide, OrderStatus};
use ballast_telemetry::MetricsCollector;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Executes single-ticker notional orders against the broker gateway.
pub struct OrderExecutor {
    broker: Arc<dyn BrokerGateway>,
    metrics: Arc<MetricsCollector>,
}

impl OrderExecutor {
    pub fn new(broker: Arc<dyn BrokerGateway>, metrics: Arc<MetricsCollector>) -> Self {
        Self { broker, metrics }
    }

    /// Execute one order of `amount_usd` (unsigned, > 0) on `side`.
    ///
    /// Runs up to `max_retries + 1` attempts with exponential backoff
    /// (1s, 2s, 4s, ...). Failures are encoded in the returned
    /// `OrderResult`, never raised. A non-retryable error stops
    /// immediately but still reports `retry_count = max_retries`:
    /// the budget is definitively exhausted, not partially consumed.
    pub async fn execute(
        &self,
        symbol: &str,
        amount_usd: Decimal,
        side: OrderSide,
        max_retries: u32,
    ) -> OrderResult {
        debug_assert!(amount_usd > Decimal::ZERO, "zero orders must be filtered upstream");

        let start = Instant::now();
        let mut last_error = String::new();

        self.metrics.increment("orders_executed");
        self.metrics.increment("api_calls_total");

        for attempt in 0..=max_retries {
            match self.try_once(symbol, amount_usd, side).await {
                Ok(ack) => {
                    info!(
                        symbol,
                        %amount_usd,
                        side = %side,
                        order_id = %ack.order_id,
                        attempt = attempt + 1,
                        attempts_allowed = max_retries + 1,
                        "Order submitted"
                    );

                    self.metrics.increment("orders_success");
                    self.metrics.record_duration(
                        "order_execution_duration_ms",
                        start.elapsed().as_secs_f64() * 1000.0,
                    );

                    return OrderResult {
                        symbol: symbol.to_string(),
                        side,
                        amount_usd,
                        status: OrderStatus::Success,
                        order_id: Some(ack.order_id),
                        error_message: None,
                        retry_count: attempt,
                    };
                }
                Err(message) => {
                    warn!(
                        symbol,
                        side = %side,
                        error = %message,
                        attempt = attempt + 1,
                        attempts_allowed = max_retries + 1,
                        "Order attempt failed"
                    );
                    last_error = message;

                    if !is_retryable_error(&last_error) {
                        error!(symbol, "Non-retryable error, skipping retries");
                        break;
                    }
                    if attempt < max_retries {
                        let backoff = Duration::from_secs(1 << attempt);
                        info!(symbol, backoff_secs = backoff.as_secs(), "Retrying");
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        self.metrics.increment("orders_failed");
        self.metrics.increment("api_errors");

        OrderResult {
            symbol: symbol.to_string(),
            side,
            amount_usd,
            status: OrderStatus::Failed,
            order_id: None,
            error_message: Some(last_error),
            retry_count: max_retries,
        }
    }

    /// One attempt: fetch a reference price, then submit the notional
    /// order. The reference price is observability only; the order
    /// itself is dollar-denominated.
    async fn try_once(
        &self,
        symbol: &str,
        amount_usd: Decimal,
        side: OrderSide,
    ) -> Result<OrderAck, String> {
        let quote = self
            .broker
            .get_latest_quote(symbol)
            .await
            .map_err(|e| e.to_string())?;
        let reference = quote.reference_price(side);

        info!(symbol, %reference, side = %side, "Reference price");

        self.broker
            .submit_notional_order(symbol, amount_usd, side)
            .await
            .map_err(|e| e.to_string())
    }
}
