//! Typed `/crypto/*` market-data endpoints.
//!
//! The backend caches and rate-limits these (CoinGecko behind it); the cache
//! status comes back in an `X-Cache` header, which this client ignores.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::ApiClient;
use crate::error::{ClientError, Result};
use crate::research::validate_id;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub coin_id: String,
    pub name: String,
    pub symbol: String,
    pub current_price: f64,
    pub price_change_24h: f64,
    pub price_change_percentage_24h: f64,
    pub market_cap: f64,
    pub volume_24h: f64,
    pub last_updated: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingCoin {
    pub coin_id: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    pub price_btc: f64,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trending {
    pub coins: Vec<TrendingCoin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinSearchResult {
    pub coin_id: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub thumb: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinSearch {
    pub coins: Vec<CoinSearchResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOverview {
    pub total_market_cap: f64,
    pub total_volume_24h: f64,
    pub btc_dominance: f64,
    pub eth_dominance: f64,
    pub active_cryptocurrencies: u64,
    pub markets: u64,
    pub market_cap_change_24h: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    /// Unix milliseconds.
    pub timestamp: i64,
    pub price: f64,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Historical {
    pub coin_id: String,
    pub prices: Vec<HistoricalPoint>,
    pub days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    #[serde(default)]
    pub context: Option<Value>,
}

/// `/crypto/*` endpoints bound to one session.
#[derive(Clone, Copy)]
pub struct CryptoApi<'a> {
    client: &'a ApiClient,
    session: &'a Session,
}

impl<'a> CryptoApi<'a> {
    pub fn new(client: &'a ApiClient, session: &'a Session) -> Self {
        Self { client, session }
    }

    pub async fn price(&self, coin_id: &str) -> Result<Price> {
        validate_id("coin", coin_id)?;
        self.client
            .get_json(self.session, &format!("/crypto/price/{}", coin_id), &[])
            .await
    }

    pub async fn trending(&self) -> Result<Trending> {
        self.client
            .get_json(self.session, "/crypto/trending", &[])
            .await
    }

    pub async fn search(&self, query: &str) -> Result<CoinSearch> {
        if query.trim().is_empty() {
            return Err(ClientError::Invalid("search query must not be empty".into()));
        }
        self.client
            .get_json(self.session, "/crypto/search", &[("query", query.to_string())])
            .await
    }

    pub async fn market_overview(&self) -> Result<MarketOverview> {
        self.client
            .get_json(self.session, "/crypto/market-overview", &[])
            .await
    }

    pub async fn historical(&self, coin_id: &str, days: u32) -> Result<Historical> {
        validate_id("coin", coin_id)?;
        if days == 0 {
            return Err(ClientError::Invalid("days must be >= 1".into()));
        }
        self.client
            .get_json(
                self.session,
                &format!("/crypto/historical/{}", coin_id),
                &[("days", days.to_string())],
            )
            .await
    }

    /// Sends a chat turn. `history` is the conversation so far.
    pub async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        if req.message.trim().is_empty() {
            return Err(ClientError::Invalid("message must not be empty".into()));
        }
        self.client
            .post_json(self.session, "/crypto/chat", req)
            .await
    }
}
