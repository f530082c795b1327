//! Trade executor (spec §4.6 / C7): a per-`(principal, venue)` client
//! cache, a safety gate consulting `AutoTradeConfig`, and `VenueOrder`
//! persistence through its pending -> submitted/failed -> filled/cancelled
//! lifecycle. Grounded on the teacher's `wallets.rs` balance-aggregation
//! style and sBot9999's `execution.rs`/`risk.rs` safety-gate shape, with
//! the fill reconciler SPEC_FULL.md §9 calls for: nothing in the source
//! ever calls `recordTradeResult`, so the circuit breaker never trips
//! without one.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::db::{self, Db};
use crate::error::{AppError, AppResult};
use crate::vault::KeyVault;
use crate::venues::{Venue, VenueClient, VenueCredentials};

pub struct ExecuteOrderRequest {
    pub principal_id: String,
    pub venue: Venue,
    pub symbol: String,
    /// `"BUY"` or `"SELL"`.
    pub side: String,
    /// `"market"` or `"limit"`.
    pub order_type: String,
    pub quantity: f64,
    pub price: Option<f64>,
    pub source: String,
    pub ai_signal_id: Option<String>,
}

pub struct TradeExecutor {
    db: Db,
    vault: Arc<KeyVault>,
    cache: RwLock<HashMap<(String, Venue), Arc<VenueClient>>>,
    /// Tracks the entry price of the most recent open BUY per
    /// `(principal, venue, symbol)`, consumed by [`reconcile_fill`] when the
    /// matching SELL fills.
    open_entries: RwLock<HashMap<(String, Venue, String), f64>>,
}

impl TradeExecutor {
    pub fn new(db: Db, vault: Arc<KeyVault>) -> Self {
        Self {
            db,
            vault,
            cache: RwLock::new(HashMap::new()),
            open_entries: RwLock::new(HashMap::new()),
        }
    }

    /// Drop a cached client, e.g. on key rotation or deletion.
    pub async fn invalidate(&self, principal_id: &str, venue: Venue) {
        self.cache.write().await.remove(&(principal_id.to_string(), venue));
    }

    /// Public access to the cached/decrypted venue client, for gateway reads
    /// (balance, open orders, cancel) that don't go through `execute_order`.
    pub async fn client(&self, principal_id: &str, venue: Venue) -> AppResult<Arc<VenueClient>> {
        self.client_for(principal_id, venue).await
    }

    pub async fn has_cached_client(&self, principal_id: &str, venue: Venue) -> bool {
        self.cache.read().await.contains_key(&(principal_id.to_string(), venue))
    }

    async fn client_for(&self, principal_id: &str, venue: Venue) -> AppResult<Arc<VenueClient>> {
        if let Some(client) = self.cache.read().await.get(&(principal_id.to_string(), venue)) {
            return Ok(client.clone());
        }

        let record = db::keys::get(&self.db, principal_id, venue)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::NotFound("key".to_string()))?;
        let access_key = self.vault.decrypt(&record.access)?;
        let secret_key = self.vault.decrypt(&record.secret)?;

        let client = Arc::new(VenueClient::new(venue, VenueCredentials { access_key, secret_key }));
        self.cache
            .write()
            .await
            .insert((principal_id.to_string(), venue), client.clone());
        Ok(client)
    }

    /// Safety gate (spec §4.6 step 1): daily cap, consecutive-loss
    /// circuit-breaker, and position-size cap against total wallet value.
    async fn safety_gate(&self, req: &ExecuteOrderRequest) -> AppResult<()> {
        let config = db::auto_trade::get(&self.db, &req.principal_id, req.venue)
            .await
            .map_err(AppError::from)?
            .unwrap_or_default();

        if config.daily_trades_used >= config.max_daily_trades {
            return Err(AppError::SafetyBlocked("daily trade cap reached".to_string()));
        }
        if config.consecutive_losses >= config.max_consecutive_losses {
            return Err(AppError::SafetyBlocked(
                "consecutive-loss circuit breaker tripped".to_string(),
            ));
        }

        let balances = db::wallets::all_balances(&self.db, &req.principal_id)
            .await
            .map_err(AppError::from)?;
        let total: u128 = balances.iter().map(|(_, w)| w.balance).sum();
        if total > 0 {
            let notional = req.quantity * req.price.unwrap_or(1.0);
            if notional / total as f64 > config.max_position_pct {
                return Err(AppError::SafetyBlocked("position size exceeds configured max".to_string()));
            }
        }

        Ok(())
    }

    pub async fn execute_order(&self, req: ExecuteOrderRequest, now: i64) -> AppResult<db::VenueOrderRow> {
        self.safety_gate(&req).await?;

        let id = uuid::Uuid::new_v4().to_string();
        db::venue_orders::insert_pending(
            &self.db,
            db::NewVenueOrder {
                id: id.clone(),
                principal_id: req.principal_id.clone(),
                venue: req.venue,
                symbol: req.symbol.clone(),
                side: req.side.clone(),
                order_type: req.order_type.clone(),
                price: req.price,
                quantity: req.quantity,
                source: req.source.clone(),
                ai_signal_id: req.ai_signal_id.clone(),
                created_at: now,
            },
        )
        .await
        .map_err(AppError::from)?;

        let client = match self.client_for(&req.principal_id, req.venue).await {
            Ok(c) => c,
            Err(e) => {
                db::venue_orders::mark_failed(&self.db, &id, &e.truncated()).await.ok();
                return Err(e);
            }
        };

        let (venue_side, venue_type) = translate(req.venue, &req.side, &req.order_type);
        let call = client
            .place_order(&req.symbol, &venue_side, &venue_type, req.quantity, req.price)
            .await;

        match call {
            Err(err) => {
                let app_err = AppError::VenueError(502, err.to_string());
                db::venue_orders::mark_failed(&self.db, &id, &app_err.truncated())
                    .await
                    .map_err(AppError::from)?;
                return Err(app_err);
            }
            Ok(body) => {
                let exchange_order_id = extract_order_id(req.venue, &body);
                db::venue_orders::mark_submitted(&self.db, &id, &exchange_order_id, 0.0, None)
                    .await
                    .map_err(AppError::from)?;
                db::auto_trade::increment_daily_trades(&self.db, &req.principal_id, req.venue)
                    .await
                    .map_err(AppError::from)?;

                // a market order fills as soon as the venue accepts it;
                // a resting limit order doesn't, and stays `submitted` until
                // a later poll/cancel moves it on.
                if req.order_type.eq_ignore_ascii_case("market") {
                    let (filled_qty, filled_price) = extract_fill(req.venue, &body, req.quantity, req.price);
                    db::venue_orders::mark_filled(&self.db, &id, filled_qty, filled_price, 0.0)
                        .await
                        .map_err(AppError::from)?;
                }

                if req.side.eq_ignore_ascii_case("buy") {
                    if let Some(price) = req.price {
                        self.open_entries
                            .write()
                            .await
                            .insert((req.principal_id.clone(), req.venue, req.symbol.clone()), price);
                    }
                }
            }
        }

        db::venue_orders::get(&self.db, &id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::NotFound("order".to_string()))
    }

    /// Resets the consecutive-loss counter on a profitable close, or
    /// increments it on a loss, tripping the circuit breaker once it
    /// reaches `maxConsecutiveLosses` (spec §4.6).
    pub async fn record_trade_result(&self, principal_id: &str, venue: Venue, is_profit: bool) -> AppResult<()> {
        if is_profit {
            db::auto_trade::reset_consecutive_losses(&self.db, principal_id, venue)
                .await
                .map_err(AppError::from)
        } else {
            db::auto_trade::increment_consecutive_losses(&self.db, principal_id, venue)
                .await
                .map_err(AppError::from)
        }
    }

    /// On transition to `filled` for a closing SELL, compare the executed
    /// price against the tracked BUY entry price and call
    /// `record_trade_result`. This is the reconciler the source never
    /// wired up (SPEC_FULL.md §9) — without it the circuit breaker never
    /// trips.
    pub async fn reconcile_fill(
        &self,
        principal_id: &str,
        venue: Venue,
        symbol: &str,
        side: &str,
        executed_price: f64,
    ) -> AppResult<()> {
        if !side.eq_ignore_ascii_case("sell") {
            return Ok(());
        }
        let entry_price = self
            .open_entries
            .write()
            .await
            .remove(&(principal_id.to_string(), venue, symbol.to_string()));

        if let Some(entry_price) = entry_price {
            let is_profit = executed_price > entry_price;
            self.record_trade_result(principal_id, venue, is_profit).await?;
        }
        Ok(())
    }
}

fn translate(venue: Venue, side: &str, order_type: &str) -> (String, String) {
    match venue {
        Venue::BinanceLike => (side.to_uppercase(), order_type.to_uppercase()),
        Venue::UpbitLike => {
            let is_buy = side.eq_ignore_ascii_case("buy");
            let venue_side = if is_buy { "bid" } else { "ask" };
            let is_market = order_type.eq_ignore_ascii_case("market");
            let venue_type = match (is_buy, is_market) {
                (true, true) => "price",
                (false, true) => "market",
                _ => "limit",
            };
            (venue_side.to_string(), venue_type.to_string())
        }
    }
}

fn extract_order_id(venue: Venue, body: &serde_json::Value) -> String {
    match venue {
        Venue::UpbitLike => body["uuid"].as_str().unwrap_or_default().to_string(),
        Venue::BinanceLike => body["orderId"]
            .as_u64()
            .map(|n| n.to_string())
            .unwrap_or_default(),
    }
}

/// Pull the actual filled quantity/price for a just-submitted market order
/// out of the venue's place-order response, falling back to the requested
/// quantity/price when the venue didn't report enough detail to compute it
/// (e.g. an empty `fills` array, or fields in a shape this parser doesn't
/// expect).
fn extract_fill(
    venue: Venue,
    body: &serde_json::Value,
    fallback_qty: f64,
    fallback_price: Option<f64>,
) -> (f64, f64) {
    match venue {
        Venue::BinanceLike => {
            if let Some(fills) = body["fills"].as_array() {
                let mut qty_sum = 0.0;
                let mut notional_sum = 0.0;
                for fill in fills {
                    let qty: f64 = fill["qty"].as_str().and_then(|s| s.parse().ok()).unwrap_or(0.0);
                    let price: f64 = fill["price"].as_str().and_then(|s| s.parse().ok()).unwrap_or(0.0);
                    qty_sum += qty;
                    notional_sum += qty * price;
                }
                if qty_sum > 0.0 {
                    return (qty_sum, notional_sum / qty_sum);
                }
            }
            let executed_qty: Option<f64> = body["executedQty"].as_str().and_then(|s| s.parse().ok());
            let quote_qty: Option<f64> = body["cummulativeQuoteQty"].as_str().and_then(|s| s.parse().ok());
            if let (Some(qty), Some(quote)) = (executed_qty, quote_qty) {
                if qty > 0.0 {
                    return (qty, quote / qty);
                }
            }
            (fallback_qty, fallback_price.unwrap_or(0.0))
        }
        Venue::UpbitLike => {
            let qty: Option<f64> = body["executed_volume"].as_str().and_then(|s| s.parse().ok());
            let price: Option<f64> = body["price"].as_str().and_then(|s| s.parse().ok());
            match (qty, price) {
                (Some(q), Some(p)) if q > 0.0 => (q, p),
                _ => (fallback_qty, fallback_price.unwrap_or(0.0)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_in_memory, users};

    async fn seed_user(db: &Db) -> String {
        users::create_user(
            db,
            users::NewUser {
                id: "trader-1".into(),
                email: "t@t".into(),
                username: "t".into(),
                password_hash: "x".into(),
                created_at: 0,
            },
        )
        .await
        .unwrap();
        "trader-1".to_string()
    }

    fn request(uid: &str) -> ExecuteOrderRequest {
        ExecuteOrderRequest {
            principal_id: uid.to_string(),
            venue: Venue::BinanceLike,
            symbol: "BTCUSDT".to_string(),
            side: "buy".to_string(),
            order_type: "market".to_string(),
            quantity: 0.01,
            price: Some(50_000.0),
            source: "auto".to_string(),
            ai_signal_id: None,
        }
    }

    /// Spec §8 scenario 5: consecutive-loss circuit breaker blocks a
    /// BUY before any venue call or `VenueOrder` row is created.
    #[tokio::test]
    async fn consecutive_loss_breaker_blocks_before_any_order_is_persisted() {
        let db = open_in_memory();
        let uid = seed_user(&db).await;
        let mut config = db::auto_trade::AutoTradeConfig::default();
        config.max_consecutive_losses = 3;
        config.consecutive_losses = 3;
        db::auto_trade::upsert(&db, &uid, Venue::BinanceLike, &config).await.unwrap();

        let vault = Arc::new(KeyVault::new(b"test-pass").unwrap());
        let executor = TradeExecutor::new(db.clone(), vault);

        let result = executor.execute_order(request(&uid), 0).await;
        assert!(matches!(result, Err(AppError::SafetyBlocked(_))));

        let orders = db::venue_orders::list_for_principal(&db, &uid, 10).await.unwrap();
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn daily_cap_blocks_before_any_order_is_persisted() {
        let db = open_in_memory();
        let uid = seed_user(&db).await;
        let mut config = db::auto_trade::AutoTradeConfig::default();
        config.max_daily_trades = 1;
        config.daily_trades_used = 1;
        db::auto_trade::upsert(&db, &uid, Venue::BinanceLike, &config).await.unwrap();

        let vault = Arc::new(KeyVault::new(b"test-pass").unwrap());
        let executor = TradeExecutor::new(db.clone(), vault);

        let result = executor.execute_order(request(&uid), 0).await;
        assert!(matches!(result, Err(AppError::SafetyBlocked(_))));
        assert!(db::venue_orders::list_for_principal(&db, &uid, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_position_is_blocked_against_wallet_total() {
        let db = open_in_memory();
        let uid = seed_user(&db).await;
        db::wallets::add_balance(&db, &uid, "USDT", 100).await.unwrap();
        let config = db::auto_trade::AutoTradeConfig::default(); // max_position_pct = 0.1
        db::auto_trade::upsert(&db, &uid, Venue::BinanceLike, &config).await.unwrap();

        let vault = Arc::new(KeyVault::new(b"test-pass").unwrap());
        let executor = TradeExecutor::new(db.clone(), vault);

        // notional = 0.01 * 50_000 = 500, which is 5x the 100 USDT wallet.
        let result = executor.execute_order(request(&uid), 0).await;
        assert!(matches!(result, Err(AppError::SafetyBlocked(_))));
    }

    #[tokio::test]
    async fn record_trade_result_resets_or_increments_consecutive_losses() {
        let db = open_in_memory();
        let uid = seed_user(&db).await;
        let mut config = db::auto_trade::AutoTradeConfig::default();
        config.consecutive_losses = 2;
        db::auto_trade::upsert(&db, &uid, Venue::BinanceLike, &config).await.unwrap();

        let vault = Arc::new(KeyVault::new(b"test-pass").unwrap());
        let executor = TradeExecutor::new(db.clone(), vault);

        executor.record_trade_result(&uid, Venue::BinanceLike, false).await.unwrap();
        let after_loss = db::auto_trade::get(&db, &uid, Venue::BinanceLike).await.unwrap().unwrap();
        assert_eq!(after_loss.consecutive_losses, 3);

        executor.record_trade_result(&uid, Venue::BinanceLike, true).await.unwrap();
        let after_profit = db::auto_trade::get(&db, &uid, Venue::BinanceLike).await.unwrap().unwrap();
        assert_eq!(after_profit.consecutive_losses, 0);
    }
}
