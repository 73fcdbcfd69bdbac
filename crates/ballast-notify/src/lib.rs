//! Outcome notifications.
//!
//! One notification per terminal rebalance outcome, delivered to the
//! configured channel. Delivery is strictly best-effort: a failed send
//! is a warning in the logs, never an error for the caller, because a
//! rebalance must not fail over a notification.

pub mod notifier;

pub use notifier::{NotifyConfig, NotifyMethod, Notifier, Severity};
