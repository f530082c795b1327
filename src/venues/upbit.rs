//! Upbit-style signed REST client: a short-lived JWT carries `access_key`
//! and a nonce, plus a `query_hash` (SHA-512 of the request's query string)
//! whenever the request has parameters. Grounded on the teacher's
//! `api/auth.rs` JWT helpers (`create_jwt`/`verify_jwt` via `jsonwebtoken`),
//! generalized from a user-session token to a per-request signed token.

use anyhow::{bail, Context, Result};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument};

use super::VenueCredentials;

/// Minimum spacing between requests for a single client instance (spec
/// §4.5: 100ms for Upbit-like venues).
const THROTTLE: Duration = Duration::from_millis(100);

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    access_key: String,
    nonce: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash_alg: Option<&'static str>,
}

pub struct UpbitClient {
    credentials: VenueCredentials,
    base_url: String,
    client: reqwest::Client,
    last_call: Mutex<Option<Instant>>,
}

impl UpbitClient {
    pub fn new(credentials: VenueCredentials) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        Self {
            credentials,
            base_url: "https://api.upbit.com".to_string(),
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

    fn token_for(&self, query: Option<&str>) -> Result<String> {
        let nonce = uuid::Uuid::new_v4().to_string();
        let claims = match query {
            Some(q) if !q.is_empty() => {
                let mut hasher = Sha512::new();
                hasher.update(q.as_bytes());
                Claims {
                    access_key: self.credentials.access_key.clone(),
                    nonce,
                    query_hash: Some(hex::encode(hasher.finalize())),
                    query_hash_alg: Some("SHA512"),
                }
            }
            _ => Claims {
                access_key: self.credentials.access_key.clone(),
                nonce,
                query_hash: None,
                query_hash_alg: None,
            },
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.credentials.secret_key.as_bytes()),
        )
        .context("signing upbit jwt")
    }

    #[instrument(skip(self), name = "upbit::get_accounts")]
    pub async fn get_accounts(&self) -> Result<serde_json::Value> {
        self.throttle().await;
        let token = self.token_for(None)?;
        let url = format!("{}/v1/accounts", self.base_url);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("GET /v1/accounts request failed")?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("parsing accounts response")?;
        if !status.is_success() {
            bail!("Upbit GET /v1/accounts returned {status}: {body}");
        }
        Ok(body)
    }

    #[instrument(skip(self), name = "upbit::get_account")]
    pub async fn get_account(&self, currency: &str) -> Result<f64> {
        let accounts = self.get_accounts().await?;
        let list = accounts.as_array().context("accounts response is not an array")?;
        for acct in list {
            if acct["currency"].as_str() == Some(currency) {
                let balance: f64 = acct["balance"].as_str().unwrap_or("0").parse().unwrap_or(0.0);
                return Ok(balance);
            }
        }
        Ok(0.0)
    }

    #[instrument(skip(self, price), name = "upbit::place_order")]
    pub async fn place_order(
        &self,
        market: &str,
        side: &str,
        order_type: &str,
        volume: Option<f64>,
        price: Option<f64>,
    ) -> Result<serde_json::Value> {
        self.throttle().await;
        let mut query = format!("market={market}&side={side}&ord_type={order_type}");
        if let Some(v) = volume {
            query.push_str(&format!("&volume={v}"));
        }
        if let Some(p) = price {
            query.push_str(&format!("&price={p}"));
        }
        let token = self.token_for(Some(&query))?;
        let url = format!("{}/v1/orders?{}", self.base_url, query);

        debug!(market, side, order_type, "placing order");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("POST /v1/orders request failed")?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("parsing order response")?;
        if status != reqwest::StatusCode::CREATED && status != reqwest::StatusCode::OK {
            bail!("Upbit POST /v1/orders returned {status}: {body}");
        }
        Ok(body)
    }

    #[instrument(skip(self), name = "upbit::cancel_order")]
    pub async fn cancel_order(&self, order_id: &str) -> Result<serde_json::Value> {
        self.throttle().await;
        let query = format!("uuid={order_id}");
        let token = self.token_for(Some(&query))?;
        let url = format!("{}/v1/order?{}", self.base_url, query);

        let resp = self
            .client
            .delete(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("DELETE /v1/order request failed")?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("parsing cancel response")?;
        if !status.is_success() {
            bail!("Upbit DELETE /v1/order returned {status}: {body}");
        }
        Ok(body)
    }

    #[instrument(skip(self), name = "upbit::get_order")]
    pub async fn get_order(&self, order_id: &str) -> Result<serde_json::Value> {
        self.throttle().await;
        let query = format!("uuid={order_id}");
        let token = self.token_for(Some(&query))?;
        let url = format!("{}/v1/order?{}", self.base_url, query);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("GET /v1/order request failed")?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("parsing order response")?;
        if !status.is_success() {
            bail!("Upbit GET /v1/order returned {status}: {body}");
        }
        Ok(body)
    }

    #[instrument(skip(self), name = "upbit::get_open_orders")]
    pub async fn get_open_orders(&self, market: Option<&str>) -> Result<Vec<serde_json::Value>> {
        self.throttle().await;
        let query = match market {
            Some(m) => format!("market={m}&state=wait"),
            None => "state=wait".to_string(),
        };
        let token = self.token_for(Some(&query))?;
        let url = format!("{}/v1/orders?{}", self.base_url, query);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("GET /v1/orders request failed")?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("parsing orders response")?;
        if !status.is_success() {
            bail!("Upbit GET /v1/orders returned {status}: {body}");
        }
        Ok(body.as_array().cloned().unwrap_or_default())
    }
}
