//! Alpaca REST client.
//!
//! Implements `BrokerGateway` against the Alpaca trading and market data
//! APIs. Orders are always notional DAY market orders; share-count
//! orders are never used.

use crate::error::{BrokerError, BrokerResult};
use crate::gateway::{BrokerGateway, OrderAck};
use async_trait::async_trait;
use ballast_core::{AccountSnapshot, OrderSide, Position, Quote};
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const KEY_HEADER: &str = "APCA-API-KEY-ID";
const SECRET_HEADER: &str = "APCA-API-SECRET-KEY";

/// Broker connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// API key id. Falls back to `ALPACA_API_KEY` when empty.
    #[serde(default)]
    pub api_key: String,
    /// API secret. Falls back to `ALPACA_SECRET_KEY` when empty.
    #[serde(default)]
    pub secret_key: String,
    /// Use the paper trading endpoint. Default: true.
    #[serde(default = "default_paper")]
    pub paper: bool,
    /// Trading API base URL override.
    #[serde(default)]
    pub trading_url: Option<String>,
    /// Market data API base URL override.
    #[serde(default)]
    pub data_url: Option<String>,
    /// Request timeout in seconds. Default: 10.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_paper() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            secret_key: String::new(),
            paper: default_paper(),
            trading_url: None,
            data_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BrokerConfig {
    fn resolved_key(&self) -> BrokerResult<(String, String)> {
        let key = if self.api_key.is_empty() {
            std::env::var("ALPACA_API_KEY").unwrap_or_default()
        } else {
            self.api_key.clone()
        };
        let secret = if self.secret_key.is_empty() {
            std::env::var("ALPACA_SECRET_KEY").unwrap_or_default()
        } else {
            self.secret_key.clone()
        };
        if key.is_empty() || secret.is_empty() {
            return Err(BrokerError::Auth(
                "API keys not found; set ALPACA_API_KEY and ALPACA_SECRET_KEY".to_string(),
            ));
        }
        Ok((key, secret))
    }

    fn trading_base(&self) -> String {
        if let Some(url) = &self.trading_url {
            return url.trim_end_matches('/').to_string();
        }
        if self.paper {
            "https://paper-api.alpaca.markets".to_string()
        } else {
            "https://api.alpaca.markets".to_string()
        }
    }

    fn data_base(&self) -> String {
        self.data_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| "https://data.alpaca.markets".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    cash: Decimal,
    equity: Decimal,
    last_equity: Decimal,
    portfolio_value: Decimal,
}

#[derive(Debug, Deserialize)]
struct PositionResponse {
    symbol: String,
    market_value: Decimal,
}

#[derive(Debug, Deserialize)]
struct LatestQuoteResponse {
    quote: QuoteBody,
}

#[derive(Debug, Deserialize)]
struct QuoteBody {
    #[serde(rename = "bp")]
    bid_price: Decimal,
    #[serde(rename = "ap")]
    ask_price: Decimal,
}

#[derive(Debug, Serialize)]
struct NotionalOrderRequest<'a> {
    symbol: &'a str,
    notional: Decimal,
    side: &'a str,
    #[serde(rename = "type")]
    order_type: &'a str,
    time_in_force: &'a str,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
}

/// REST client for the Alpaca trading and data APIs.
pub struct AlpacaClient {
    http: reqwest::Client,
    trading_base: String,
    data_base: String,
}

impl AlpacaClient {
    /// Build a client from config; validates that credentials resolve.
    pub fn new(config: &BrokerConfig) -> BrokerResult<Self> {
        let (key, secret) = config.resolved_key()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            KEY_HEADER,
            HeaderValue::from_str(&key).map_err(|_| {
                BrokerError::Auth("API key contains invalid characters".to_string())
            })?,
        );
        headers.insert(
            SECRET_HEADER,
            HeaderValue::from_str(&secret).map_err(|_| {
                BrokerError::Auth("API secret contains invalid characters".to_string())
            })?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        info!(paper = config.paper, "Alpaca client initialized");

        Ok(Self {
            http,
            trading_base: config.trading_base(),
            data_base: config.data_base(),
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> BrokerResult<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BrokerError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| BrokerError::Decode(e.to_string()))
    }
}

#[async_trait]
impl BrokerGateway for AlpacaClient {
    async fn get_account(&self) -> BrokerResult<AccountSnapshot> {
        let url = format!("{}/v2/account", self.trading_base);
        let account: AccountResponse = Self::decode(self.http.get(&url).send().await?).await?;

        Ok(AccountSnapshot {
            cash: account.cash,
            equity: account.equity,
            last_equity: account.last_equity,
            portfolio_value: account.portfolio_value,
        })
    }

    async fn get_positions(&self) -> BrokerResult<Vec<Position>> {
        let url = format!("{}/v2/positions", self.trading_base);
        let positions: Vec<PositionResponse> =
            Self::decode(self.http.get(&url).send().await?).await?;

        Ok(positions
            .into_iter()
            .map(|p| Position {
                symbol: p.symbol,
                market_value: p.market_value,
            })
            .collect())
    }

    async fn get_latest_quote(&self, symbol: &str) -> BrokerResult<Quote> {
        let url = format!("{}/v2/stocks/{}/quotes/latest", self.data_base, symbol);
        let latest: LatestQuoteResponse = Self::decode(self.http.get(&url).send().await?).await?;

        Ok(Quote {
            bid: latest.quote.bid_price,
            ask: latest.quote.ask_price,
        })
    }

    async fn submit_notional_order(
        &self,
        symbol: &str,
        amount_usd: Decimal,
        side: OrderSide,
    ) -> BrokerResult<OrderAck> {
        let url = format!("{}/v2/orders", self.trading_base);
        let request = NotionalOrderRequest {
            symbol,
            notional: amount_usd.round_dp(2),
            side: side.as_str(),
            order_type: "market",
            time_in_force: "day",
        };

        debug!(symbol, %amount_usd, side = %side, "Submitting notional order");

        let order: OrderResponse =
            Self::decode(self.http.post(&url).json(&request).send().await?).await?;

        Ok(OrderAck { order_id: order.id })
    }
}
