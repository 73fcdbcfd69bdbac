//! Core domain types for the ballast portfolio rebalancing bot.
//!
//! This crate provides the value types shared across the system:
//! - `TargetAllocation`, `PositionSnapshot`, `DriftVector`: weight maps
//! - `OrderIntent`, `OrderResult`: planned and executed orders
//! - `AccountSnapshot`, `Position`, `Quote`: broker-facing snapshots

pub mod account;
pub mod allocation;
pub mod error;
pub mod order;

pub use account::{AccountSnapshot, Position, Quote};
pub use allocation::{
    DriftVector, PositionSnapshot, TargetAllocation, ALLOCATION_SUM_TOLERANCE,
};
pub use error::{CoreError, Result};
pub use order::{OrderIntent, OrderResult, OrderSide, OrderStatus};
