//! Broker gateway for the ballast rebalancing bot.
//!
//! Provides:
//! - `BrokerGateway`: the async capability the orchestration core consumes
//! - `AlpacaClient`: REST client for the Alpaca trading and data APIs
//! - `ScriptedBroker`: in-memory broker with scripted responses for tests

pub mod alpaca;
pub mod error;
pub mod gateway;
pub mod paper;

pub use alpaca::{AlpacaClient, BrokerConfig};
pub use error::{BrokerError, BrokerResult};
pub use gateway::{BrokerGateway, OrderAck};
pub use paper::ScriptedBroker;
