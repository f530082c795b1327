//! Binance-style signed REST client: HMAC-SHA256 over the request query
//! string, timestamp + recvWindow appended before signing, API key carried
//! as a header. Adapted directly from the sibling sBot9999 example's
//! `binance/client.rs`.

use anyhow::{bail, Context, Result};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument};

use super::VenueCredentials;

type HmacSha256 = Hmac<Sha256>;

const RECV_WINDOW: u64 = 5000;
/// Minimum spacing between requests for a single client instance: 50ms
/// for Binance-like venues.
const THROTTLE: Duration = Duration::from_millis(50);

pub struct BinanceClient {
    credentials: VenueCredentials,
    base_url: String,
    client: reqwest::Client,
    last_call: Mutex<Option<Instant>>,
}

impl BinanceClient {
    pub fn new(credentials: VenueCredentials) -> Self {
        let mut default_headers = HeaderMap::new();
        if let Ok(val) = HeaderValue::from_str(&credentials.access_key) {
            default_headers.insert("X-MBX-APIKEY", val);
        }
        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        Self {
            credentials,
            base_url: "https://api.binance.com".to_string(),
            client,
            last_call: Mutex::new(None),
        }
    }

    async fn throttle(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < THROTTLE {
                tokio::time::sleep(THROTTLE - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.credentials.secret_key.as_bytes())
            .expect("HMAC accepts any key size");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before UNIX epoch")
            .as_millis() as u64
    }

    fn signed_query(&self, params: &str) -> String {
        let ts = Self::timestamp_ms();
        let base = if params.is_empty() {
            format!("timestamp={ts}&recvWindow={RECV_WINDOW}")
        } else {
            format!("{params}&timestamp={ts}&recvWindow={RECV_WINDOW}")
        };
        let sig = self.sign(&base);
        format!("{base}&signature={sig}")
    }

    #[instrument(skip(self), name = "binance::get_accounts")]
    pub async fn get_accounts(&self) -> Result<serde_json::Value> {
        self.throttle().await;
        let qs = self.signed_query("");
        let url = format!("{}/api/v3/account?{}", self.base_url, qs);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/account request failed")?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("parsing account response")?;
        if status != reqwest::StatusCode::OK {
            bail!("Binance GET /api/v3/account returned {status}: {body}");
        }
        Ok(body)
    }

    #[instrument(skip(self), name = "binance::get_account")]
    pub async fn get_account(&self, asset: &str) -> Result<f64> {
        let account = self.get_accounts().await?;
        let balances = account["balances"]
            .as_array()
            .context("account response missing 'balances' array")?;
        for b in balances {
            if b["asset"].as_str() == Some(asset) {
                let free: f64 = b["free"].as_str().unwrap_or("0").parse().unwrap_or(0.0);
                return Ok(free);
            }
        }
        Ok(0.0)
    }

    #[instrument(skip(self, price), name = "binance::place_order")]
    pub async fn place_order(
        &self,
        symbol: &str,
        side: &str,
        order_type: &str,
        quantity: f64,
        price: Option<f64>,
    ) -> Result<serde_json::Value> {
        self.throttle().await;
        let mut params = format!("symbol={symbol}&side={side}&type={order_type}&quantity={quantity}");
        if let Some(p) = price {
            params.push_str(&format!("&price={p}&timeInForce=GTC"));
        }
        let qs = self.signed_query(&params);
        let url = format!("{}/api/v3/order?{}", self.base_url, qs);

        debug!(symbol, side, order_type, quantity, "placing order");
        let resp = self
            .client
            .post(&url)
            .send()
            .await
            .context("POST /api/v3/order request failed")?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("parsing order response")?;
        if status != reqwest::StatusCode::OK {
            bail!("Binance POST /api/v3/order returned {status}: {body}");
        }
        Ok(body)
    }

    #[instrument(skip(self), name = "binance::cancel_order")]
    pub async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<serde_json::Value> {
        self.throttle().await;
        let params = format!("symbol={symbol}&orderId={order_id}");
        let qs = self.signed_query(&params);
        let url = format!("{}/api/v3/order?{}", self.base_url, qs);

        let resp = self
            .client
            .delete(&url)
            .send()
            .await
            .context("DELETE /api/v3/order request failed")?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("parsing cancel response")?;
        if status != reqwest::StatusCode::OK {
            bail!("Binance DELETE /api/v3/order returned {status}: {body}");
        }
        Ok(body)
    }

    #[instrument(skip(self), name = "binance::get_order")]
    pub async fn get_order(&self, symbol: &str, order_id: &str) -> Result<serde_json::Value> {
        self.throttle().await;
        let params = format!("symbol={symbol}&orderId={order_id}");
        let qs = self.signed_query(&params);
        let url = format!("{}/api/v3/order?{}", self.base_url, qs);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/order request failed")?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("parsing order response")?;
        if status != reqwest::StatusCode::OK {
            bail!("Binance GET /api/v3/order returned {status}: {body}");
        }
        Ok(body)
    }

    #[instrument(skip(self), name = "binance::get_open_orders")]
    pub async fn get_open_orders(&self, symbol: Option<&str>) -> Result<Vec<serde_json::Value>> {
        self.throttle().await;
        let params = match symbol {
            Some(s) => format!("symbol={s}"),
            None => String::new(),
        };
        let qs = self.signed_query(&params);
        let url = format!("{}/api/v3/openOrders?{}", self.base_url, qs);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/openOrders request failed")?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("parsing openOrders response")?;
        if status != reqwest::StatusCode::OK {
            bail!("Binance GET /api/v3/openOrders returned {status}: {body}");
        }
        Ok(body.as_array().cloned().unwrap_or_default())
    }
}
