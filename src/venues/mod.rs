//! External venue clients (spec C6): typed routing between a Binance-style
//! HMAC venue and an Upbit-style JWT venue, per SPEC_FULL.md §9's decision
//! to dispatch on a closed `Venue` enum rather than sniff credential shape.

pub mod binance;
pub mod market;
pub mod upbit;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use binance::BinanceClient;
use upbit::UpbitClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    #[serde(rename = "upbit")]
    UpbitLike,
    #[serde(rename = "binance")]
    BinanceLike,
}

#[derive(Debug, Clone)]
pub struct VenueCredentials {
    pub access_key: String,
    pub secret_key: String,
}

pub enum VenueClient {
    Upbit(UpbitClient),
    Binance(BinanceClient),
}

impl VenueClient {
    pub fn new(venue: Venue, credentials: VenueCredentials) -> Self {
        match venue {
            Venue::UpbitLike => VenueClient::Upbit(UpbitClient::new(credentials)),
            Venue::BinanceLike => VenueClient::Binance(BinanceClient::new(credentials)),
        }
    }

    pub async fn get_accounts(&self) -> Result<serde_json::Value> {
        match self {
            VenueClient::Upbit(c) => c.get_accounts().await,
            VenueClient::Binance(c) => c.get_accounts().await,
        }
    }

    pub async fn get_account(&self, symbol: &str) -> Result<f64> {
        match self {
            VenueClient::Upbit(c) => c.get_account(symbol).await,
            VenueClient::Binance(c) => c.get_account(symbol).await,
        }
    }

    /// `side` is `"bid"`/`"ask"` for Upbit or `"BUY"`/`"SELL"` for Binance;
    /// the executor normalizes before calling through.
    pub async fn place_order(
        &self,
        market: &str,
        side: &str,
        order_type: &str,
        amount: f64,
        price: Option<f64>,
    ) -> Result<serde_json::Value> {
        match self {
            VenueClient::Upbit(c) => c.place_order(market, side, order_type, Some(amount), price).await,
            VenueClient::Binance(c) => c.place_order(market, side, order_type, amount, price).await,
        }
    }

    pub async fn cancel_order(&self, market: &str, order_id: &str) -> Result<serde_json::Value> {
        match self {
            VenueClient::Upbit(c) => c.cancel_order(order_id).await,
            VenueClient::Binance(c) => c.cancel_order(market, order_id).await,
        }
    }

    pub async fn get_order(&self, market: &str, order_id: &str) -> Result<serde_json::Value> {
        match self {
            VenueClient::Upbit(c) => c.get_order(order_id).await,
            VenueClient::Binance(c) => c.get_order(market, order_id).await,
        }
    }

    pub async fn get_open_orders(&self, market: Option<&str>) -> Result<Vec<serde_json::Value>> {
        match self {
            VenueClient::Upbit(c) => c.get_open_orders(market).await,
            VenueClient::Binance(c) => c.get_open_orders(market).await,
        }
    }
}
