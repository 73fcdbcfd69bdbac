//! Daily-loss circuit breaker.

use ballast_core::AccountSnapshot;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Risk configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Maximum tolerated single-day loss as a fraction of prior-day
    /// equity (0.05 = 5%). Default: 0.05.
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss: Decimal,
}

fn default_max_daily_loss() -> Decimal {
    "0.05".parse().expect("const default")
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_daily_loss: default_max_daily_loss(),
        }
    }
}

/// Outcome of a circuit breaker check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerVerdict {
    /// True when rebalancing must be halted for this invocation.
    pub triggered: bool,
    /// Human-readable explanation for logs and notifications.
    pub reason: String,
}

/// Pre-flight daily-loss check.
///
/// Triggers when `(equity - last_equity) / last_equity` falls to or
/// below the negative loss threshold. The boundary is inclusive: a loss
/// of exactly the threshold halts. When prior-day equity is zero or
/// negative no meaningful ratio exists and the breaker never triggers;
/// that is a defined path, not an error.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    max_daily_loss: Decimal,
}

impl CircuitBreaker {
    pub fn new(config: &RiskConfig) -> Self {
        Self {
            max_daily_loss: config.max_daily_loss,
        }
    }

    /// Check the account against the daily-loss threshold.
    pub fn check(&self, account: &AccountSnapshot) -> BreakerVerdict {
        if account.last_equity <= Decimal::ZERO {
            return BreakerVerdict {
                triggered: false,
                reason: "no prior-day equity, circuit breaker skipped".to_string(),
            };
        }

        let daily_return = (account.equity - account.last_equity) / account.last_equity;

        if daily_return <= -self.max_daily_loss {
            let reason = format!(
                "daily loss {:.2}% exceeds max {:.2}%",
                daily_return * Decimal::ONE_HUNDRED,
                self.max_daily_loss * Decimal::ONE_HUNDRED
            );
            warn!(%daily_return, "Circuit breaker triggered");
            return BreakerVerdict {
                triggered: true,
                reason,
            };
        }

        BreakerVerdict {
            triggered: false,
            reason: format!(
                "daily return {:.2}% within limits",
                daily_return * Decimal::ONE_HUNDRED
            ),
        }
    }
}
