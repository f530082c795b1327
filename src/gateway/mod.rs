//! The gateway: the single funnel every mutating operation passes through —
//! rate limit, subsystem call, persistence, event emission — wrapped in a
//! CTP-T envelope. Built around a shared-handle pattern, generalized from
//! one big lock into independently-synchronized subsystem handles, since
//! `DexEngine`, `RiskManager`, `TradeExecutor` and `EventBus` each already
//! own their own lock.
//!
//! Rather than a stringly-typed `route(service, action, params)` dispatcher,
//! each `(service, action)` pair here is a concrete typed method; axum's own
//! routing table in `crate::api` does the dispatch, which keeps every
//! call's parameters and return type checked at compile time.

pub mod events;
pub mod rate_limit;
pub mod scheduler;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use crate::ai::{self, backtest};
use crate::config::Config;
use crate::db::{self, Db};
use crate::dex::orderbook::{LimitOrder, OrderSide, OrderStatus};
use crate::dex::{DexEngine, OrderBookSnapshot, PoolSummary};
use crate::error::{AppError, AppResult};
use crate::executor::{ExecuteOrderRequest, TradeExecutor};
use crate::risk::RiskManager;
use crate::vault::{self, KeyVault};
use crate::venues::market::{to_venue_symbol, MarketDataClient};
use crate::venues::Venue;

pub use events::{EngineEvent, EventBus};
pub use rate_limit::RateLimiter;

const CTP_VERSION: &str = "1.0";
const ENGINE_NAME: &str = "crowny-exchange";
const MIN_CANDLES_FOR_ANALYSIS: usize = 50;
/// Notional base used for the risk gate on the unauthenticated `/api/ai/*`
/// endpoints, which have no wallet to size positions against.
const DEFAULT_ANALYSIS_CAPITAL: f64 = 10_000.0;

fn now_ts() -> i64 {
    Utc::now().timestamp()
}

fn venue_str(venue: Venue) -> &'static str {
    match venue {
        Venue::UpbitLike => "upbit",
        Venue::BinanceLike => "binance",
    }
}

/// Collapse an error raised mid-transaction back into its original
/// `AppError` variant, instead of flattening every transactional failure to
/// `Internal` — the typed-error policy applies just as much to errors
/// thrown from inside `db::transaction`'s closure as to top-level ones.
fn unwrap_tx_err(err: anyhow::Error) -> AppError {
    match err.downcast::<AppError>() {
        Ok(app_err) => app_err,
        Err(err) => AppError::Internal(err.to_string()),
    }
}

/// `true` if `err` wraps a SQLite `UNIQUE`/`PRIMARY KEY` violation, so the
/// caller can surface `AppError::Conflict` instead of sniffing the message
/// text.
fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<rusqlite::Error>()
        .map(|e| {
            matches!(
                e,
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error { code: rusqlite::ErrorCode::ConstraintViolation, .. },
                    _
                )
            )
        })
        .unwrap_or(false)
}

fn ctp_envelope(trit: char, body: Value) -> Value {
    let header = json!({
        "protocol": "CTP-T",
        "version": CTP_VERSION,
        "trit": trit.to_string(),
        "engine": ENGINE_NAME,
    });
    match body {
        Value::Object(mut obj) => {
            obj.insert("ctp".to_string(), header);
            Value::Object(obj)
        }
        other => json!({ "ctp": header, "result": other }),
    }
}

pub struct Gateway {
    pub db: Db,
    pub dex: Arc<DexEngine>,
    pub risk: Arc<RiskManager>,
    pub executor: Arc<TradeExecutor>,
    pub vault: Arc<KeyVault>,
    pub market: Arc<MarketDataClient>,
    pub events: Arc<EventBus>,
    pub jwt_secret: String,
    rate_limiter: RateLimiter,
}

impl Gateway {
    pub fn new(db: Db, config: &Config) -> AppResult<Self> {
        let vault = Arc::new(KeyVault::new(&config.encryption_key)?);
        Ok(Self {
            executor: Arc::new(TradeExecutor::new(db.clone(), vault.clone())),
            dex: Arc::new(DexEngine::bootstrap()),
            risk: Arc::new(RiskManager::new(crate::risk::RiskParams::default())),
            vault,
            market: Arc::new(MarketDataClient::new()),
            events: Arc::new(EventBus::new()),
            rate_limiter: RateLimiter::new(),
            jwt_secret: config.jwt_secret.clone(),
            db,
        })
    }

    pub async fn check_rate_limit(&self, principal_id: &str) -> AppResult<()> {
        self.rate_limiter.check(principal_id).await
    }

    pub fn status_summary(&self) -> Value {
        ctp_envelope(
            '○',
            json!({
                "engine": ENGINE_NAME,
                "pools": self.dex.pool_ids().len(),
            }),
        )
    }

    // ---- auth -----------------------------------------------------

    /// Create a principal and credit the default starter wallet.
    /// Unique-constraint violations on email/username surface as
    /// `AppError::Conflict` rather than a generic internal error.
    pub async fn register_principal(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> AppResult<db::users::Principal> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_ts();
        let principal = db::users::create_user(
            &self.db,
            db::users::NewUser {
                id,
                email: email.to_string(),
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                created_at: now,
            },
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("email or username already in use".to_string())
            } else {
                AppError::from(e)
            }
        })?;

        for (token, amount) in crate::dex::token::default_mint() {
            db::wallets::add_balance(&self.db, &principal.id, token, amount).await?;
        }

        Ok(principal)
    }

    pub async fn find_credentials(&self, email_or_username: &str) -> AppResult<Option<(db::users::Principal, String)>> {
        db::users::find_credentials(&self.db, email_or_username).await.map_err(AppError::from)
    }

    pub async fn touch_last_login(&self, principal_id: &str) -> AppResult<()> {
        db::users::touch_last_login(&self.db, principal_id, now_ts()).await.map_err(AppError::from)
    }

    pub async fn record_session(&self, token: &str, principal_id: &str, expires_at: i64) -> AppResult<()> {
        db::sessions::create(&self.db, token, principal_id, now_ts(), expires_at)
            .await
            .map_err(AppError::from)
    }

    // ---- dex --------------------------------------------------------

    pub fn dex_pool_summaries(&self) -> Vec<PoolSummary> {
        self.dex
            .pool_ids()
            .iter()
            .filter_map(|id| self.dex.pool_summary(id).ok())
            .collect()
    }

    pub fn dex_pool_summary(&self, pool_id: &str) -> AppResult<PoolSummary> {
        self.dex.pool_summary(pool_id)
    }

    pub fn dex_tokens(&self) -> Vec<crate::dex::token::Token> {
        self.dex.tokens.all().cloned().collect()
    }

    pub fn dex_order_book(&self, market: &str) -> AppResult<OrderBookSnapshot> {
        self.dex.order_book_snapshot(market)
    }

    pub async fn dex_history(&self, limit: i64) -> AppResult<Vec<db::pools::SwapRow>> {
        db::pools::tail_swaps(&self.db, limit).await.map_err(AppError::from)
    }

    pub async fn dex_balances(&self, principal_id: &str) -> AppResult<Vec<(String, db::wallets::WalletEntry)>> {
        db::wallets::all_balances(&self.db, principal_id).await
    }

    /// `subtractBalance(tokenIn) -> dex.swap -> addBalance(tokenOut) ->
    /// recordSwap -> savePool`, one transaction, then `emit('swap')` (spec
    /// §4.9).
    pub async fn dex_swap(&self, principal_id: &str, pool_id: &str, token_in: &str, amount: u128) -> AppResult<Value> {
        let summary = self.dex.pool_summary(pool_id)?;
        let a_to_b = if token_in == summary.token_a {
            true
        } else if token_in == summary.token_b {
            false
        } else {
            return Err(AppError::BadInput(format!("token {token_in} is not part of pool {pool_id}")));
        };
        let token_out = if a_to_b { summary.token_b.clone() } else { summary.token_a.clone() };

        let dex = self.dex.clone();
        let pool_id_owned = pool_id.to_string();
        let token_in_owned = token_in.to_string();
        let token_out_owned = token_out.clone();
        let principal_owned = principal_id.to_string();
        let created_at = now_ts();

        let record = db::transaction(&self.db, move |tx| {
            db::wallets::subtract_balance_sync(tx, &principal_owned, &token_in_owned, amount)?;

            let pre_swap = dex.pool_snapshot(&pool_id_owned)?;
            let record = dex.swap(&pool_id_owned, a_to_b, amount)?;
            let persisted: AppResult<()> = (|| {
                db::wallets::add_balance_sync(tx, &principal_owned, &token_out_owned, record.amount_out)?;
                db::pools::record_swap_sync(tx, &principal_owned, &token_in_owned, &token_out_owned, &record, created_at)?;
                let snapshot = dex.pool_snapshot(&pool_id_owned)?;
                db::pools::save_pool_sync(tx, &snapshot)?;
                Ok(())
            })();
            if let Err(e) = persisted {
                // the SQL transaction is about to roll back; undo the
                // in-memory reserve mutation so it doesn't diverge from
                // the persisted snapshot.
                dex.restore_pool(&pool_id_owned, pre_swap);
                return Err(e.into());
            }
            Ok(record)
        })
        .await
        .map_err(unwrap_tx_err)?;

        self.events
            .publish(EngineEvent::Swap {
                pool_id: pool_id.to_string(),
                principal_id: principal_id.to_string(),
                amount_in: record.amount_in.to_string(),
                amount_out: record.amount_out.to_string(),
                trit: record.trit.glyph().to_string(),
            })
            .await;

        Ok(ctp_envelope(
            record.trit.glyph(),
            json!({
                "poolId": record.pool_id,
                "tokenIn": token_in,
                "tokenOut": token_out,
                "amountIn": record.amount_in.to_string(),
                "amountOut": record.amount_out.to_string(),
                "fee": record.fee.to_string(),
                "priceImpact": record.price_impact,
            }),
        ))
    }

    /// `subtractBalance(A) + subtractBalance(B) -> pool.addLiquidity ->
    /// savePool`, one transaction, then `emit('liquidity')`.
    pub async fn dex_add_liquidity(
        &self,
        principal_id: &str,
        pool_id: &str,
        amount_a: u128,
        amount_b: u128,
    ) -> AppResult<Value> {
        let summary = self.dex.pool_summary(pool_id)?;
        let dex = self.dex.clone();
        let pool_id_owned = pool_id.to_string();
        let principal_owned = principal_id.to_string();
        let token_a = summary.token_a.clone();
        let token_b = summary.token_b.clone();

        let minted = db::transaction(&self.db, move |tx| {
            db::wallets::subtract_balance_sync(tx, &principal_owned, &token_a, amount_a)?;
            db::wallets::subtract_balance_sync(tx, &principal_owned, &token_b, amount_b)?;

            let pre_mint = dex.pool_snapshot(&pool_id_owned)?;
            let minted = dex.add_liquidity(&pool_id_owned, &principal_owned, amount_a, amount_b)?;
            let persisted: AppResult<()> = (|| {
                let snapshot = dex.pool_snapshot(&pool_id_owned)?;
                db::pools::save_pool_sync(tx, &snapshot)?;
                Ok(())
            })();
            if let Err(e) = persisted {
                dex.restore_pool(&pool_id_owned, pre_mint);
                return Err(e.into());
            }
            Ok(minted)
        })
        .await
        .map_err(unwrap_tx_err)?;

        self.events
            .publish(EngineEvent::Liquidity {
                pool_id: pool_id.to_string(),
                principal_id: principal_id.to_string(),
                shares: minted.to_string(),
            })
            .await;

        Ok(ctp_envelope('○', json!({ "poolId": pool_id, "shares": minted.to_string() })))
    }

    /// `lockBalance(tokenB, price*amount)` on a buy / `lockBalance(tokenA,
    /// amount)` on a sell, then `dex.placeOrder -> saveOrder -> matchOrders`,
    /// settling each fill's locked balance against the counter-token (spec
    /// §9: the source never wires this settlement up), then `emit('order')`.
    ///
    /// A buy locks `token_b` at its own limit price, but fills always settle
    /// at the maker's (resting order's) price, which can be strictly better
    /// than the taker's limit. The gap between what was locked and what the
    /// fill actually consumed is released back to the buyer fill-by-fill, so
    /// a buy that is fully matched at a favorable price never leaves a
    /// residual stuck in `locked` — tracked as a running per-order tally
    /// since one call can cross several resting orders, and a resting order
    /// can also be completed later by an unrelated caller.
    pub async fn dex_place_order(
        &self,
        principal_id: &str,
        pool_id: &str,
        side: OrderSide,
        price: f64,
        amount: f64,
    ) -> AppResult<Value> {
        let summary = self.dex.pool_summary(pool_id)?;
        let (token_a, token_b) = (summary.token_a.clone(), summary.token_b.clone());
        let order_id = uuid::Uuid::new_v4().to_string();
        let created_at = now_ts();

        let lock_token = match side {
            OrderSide::Buy => token_b.clone(),
            OrderSide::Sell => token_a.clone(),
        };
        let lock_amount = match side {
            OrderSide::Buy => (price * amount).floor() as u128,
            OrderSide::Sell => amount.floor() as u128,
        };
        if lock_amount == 0 {
            return Err(AppError::BadInput("order notional rounds to zero".to_string()));
        }

        let order = LimitOrder {
            id: order_id.clone(),
            owner: principal_id.to_string(),
            market: pool_id.to_string(),
            side,
            price,
            amount,
            filled: 0.0,
            status: OrderStatus::Open,
            created_at,
        };

        let dex = self.dex.clone();
        let principal_owned = principal_id.to_string();
        let market = pool_id.to_string();
        let order_id_for_tx = order_id.clone();
        let (token_a_tx, token_b_tx) = (token_a.clone(), token_b.clone());

        let fills = db::transaction(&self.db, move |tx| {
            db::wallets::lock_balance_sync(tx, &principal_owned, &lock_token, lock_amount)?;

            let pre_book = dex.book_snapshot(&market)?;
            let fills = dex.place_order(order)?;

            let persisted: AppResult<()> = (|| {
                let saved = dex.get_order(&market, &order_id_for_tx)?;
                db::pools::save_order_sync(tx, &saved)?;

                // running filled-so-far per buy order, seeded below on first
                // sight so a fill's `before`/`after` telescope correctly even
                // when one call crosses the same resting order twice.
                let mut filled_before_call: HashMap<String, f64> = HashMap::new();
                let mut filled_so_far: HashMap<String, f64> = HashMap::new();

                for fill in &fills {
                    let buy_order = dex.get_order(&market, &fill.buy_order_id)?;
                    let sell_order = dex.get_order(&market, &fill.sell_order_id)?;
                    db::pools::save_order_sync(tx, &buy_order)?;
                    db::pools::save_order_sync(tx, &sell_order)?;

                    let notional = (fill.price * fill.amount).floor() as u128;
                    let base_amount = fill.amount.floor() as u128;
                    db::wallets::settle_fill_sync(tx, &buy_order.owner, &token_b_tx, notional, &token_a_tx, base_amount)?;
                    db::wallets::settle_fill_sync(tx, &sell_order.owner, &token_a_tx, base_amount, &token_b_tx, notional)?;

                    if !filled_before_call.contains_key(&fill.buy_order_id) {
                        // this call's total contribution to the order, so we
                        // can recover what was filled before this call started.
                        let this_call_total: f64 = fills
                            .iter()
                            .filter(|f| f.buy_order_id == fill.buy_order_id)
                            .map(|f| f.amount)
                            .sum();
                        let before = buy_order.filled - this_call_total;
                        filled_before_call.insert(fill.buy_order_id.clone(), before);
                        filled_so_far.insert(fill.buy_order_id.clone(), before);
                    }
                    let so_far = filled_so_far.get_mut(&fill.buy_order_id).unwrap();
                    let locked_before = (buy_order.price * *so_far).floor() as u128;
                    *so_far += fill.amount;
                    let locked_after = (buy_order.price * *so_far).floor() as u128;
                    let locked_at_limit = locked_after.saturating_sub(locked_before);
                    let price_improvement = locked_at_limit.saturating_sub(notional);
                    if price_improvement > 0 {
                        db::wallets::unlock_balance_sync(tx, &buy_order.owner, &token_b_tx, price_improvement)?;
                    }
                }
                Ok(())
            })();
            if let Err(e) = persisted {
                dex.restore_book(&market, pre_book);
                return Err(e.into());
            }
            Ok(fills)
        })
        .await
        .map_err(unwrap_tx_err)?;

        self.events
            .publish(EngineEvent::Order {
                pool_id: pool_id.to_string(),
                order_id: order_id.clone(),
                principal_id: principal_id.to_string(),
                status: if fills.is_empty() { "open" } else { "matched" }.to_string(),
            })
            .await;

        Ok(ctp_envelope(
            '○',
            json!({
                "orderId": order_id,
                "fills": fills.iter().map(|f| json!({
                    "price": f.price,
                    "amount": f.amount,
                    "buyOrderId": f.buy_order_id,
                    "sellOrderId": f.sell_order_id,
                })).collect::<Vec<_>>(),
            }),
        ))
    }

    pub async fn dex_cancel_order(&self, principal_id: &str, pool_id: &str, order_id: &str) -> AppResult<Value> {
        let order = self.dex.get_order(pool_id, order_id)?;
        if order.owner != principal_id {
            return Err(AppError::AuthRequired);
        }
        let remaining = order.remaining();
        self.dex.cancel_order(pool_id, order_id, principal_id)?;

        let summary = self.dex.pool_summary(pool_id)?;
        let (unlock_token, unlock_amount) = match order.side {
            OrderSide::Buy => (summary.token_b.clone(), (order.price * remaining).floor() as u128),
            OrderSide::Sell => (summary.token_a.clone(), remaining.floor() as u128),
        };
        if unlock_amount > 0 {
            db::wallets::unlock_balance(&self.db, principal_id, &unlock_token, unlock_amount).await?;
        }

        let saved = self.dex.get_order(pool_id, order_id)?;
        db::pools::save_order(&self.db, &saved).await.map_err(AppError::from)?;

        self.events
            .publish(EngineEvent::Order {
                pool_id: pool_id.to_string(),
                order_id: order_id.to_string(),
                principal_id: principal_id.to_string(),
                status: "cancelled".to_string(),
            })
            .await;

        Ok(ctp_envelope('○', json!({ "orderId": order_id, "status": "cancelled" })))
    }

    // ---- ai -----------------------------------------------------------

    /// Fetch candles, run the consensus pipeline, persist the signal, and
    /// return `{signalId, consensus}`.
    pub async fn ai_analyze(&self, venue: Venue, symbol: &str, interval: &str, count: u32) -> AppResult<Value> {
        let market_symbol = to_venue_symbol(venue, symbol);
        let candles = self
            .market
            .fetch_candles(venue, &market_symbol, interval, count)
            .await
            .map_err(|e| AppError::VenueError(502, e.to_string()))?;
        if candles.len() < MIN_CANDLES_FOR_ANALYSIS {
            return Err(AppError::BadInput(format!(
                "need at least {MIN_CANDLES_FOR_ANALYSIS} candles, got {}",
                candles.len()
            )));
        }

        let price = candles.last().unwrap().close;
        let risk_key = format!("public:{}:{symbol}", venue_str(venue));
        let consensus = ai::analyze(&candles, &self.risk, &risk_key, price, DEFAULT_ANALYSIS_CAPITAL);

        let signal_id = uuid::Uuid::new_v4().to_string();
        let decision_str = match consensus.decision {
            ai::Decision::Buy => "BUY",
            ai::Decision::Hold => "HOLD",
            ai::Decision::Sell => "SELL",
        };
        db::signals::append(
            &self.db,
            db::signals::NewSignal {
                id: signal_id.clone(),
                symbol: symbol.to_string(),
                venue: venue_str(venue).to_string(),
                interval: interval.to_string(),
                signal: decision_str.to_string(),
                score: consensus.score,
                confidence: consensus.avg_confidence,
                trit: consensus.decision.trit(),
                strategies_json: serde_json::to_string(&consensus.strategies).map_err(|e| AppError::Internal(e.to_string()))?,
                risk_json: serde_json::to_string(&consensus.risk).map_err(|e| AppError::Internal(e.to_string()))?,
                created_at: now_ts(),
            },
        )
        .await
        .map_err(AppError::from)?;

        Ok(ctp_envelope(
            consensus.decision.trit(),
            json!({ "signalId": signal_id, "consensus": consensus }),
        ))
    }

    pub async fn ai_backtest(&self, venue: Venue, symbol: &str, interval: &str, count: u32, initial_capital: f64) -> AppResult<Value> {
        let market_symbol = to_venue_symbol(venue, symbol);
        let candles = self
            .market
            .fetch_candles(venue, &market_symbol, interval, count)
            .await
            .map_err(|e| AppError::VenueError(502, e.to_string()))?;
        let result = backtest::run(&candles, initial_capital);
        Ok(ctp_envelope('○', json!({ "result": result })))
    }

    pub async fn ai_multi_analyze(&self, venue: Venue, symbols: &[String], interval: &str, count: u32) -> AppResult<Value> {
        let mut out = serde_json::Map::new();
        for symbol in symbols {
            match self.ai_analyze(venue, symbol, interval, count).await {
                Ok(body) => {
                    out.insert(symbol.clone(), body);
                }
                Err(e) => {
                    out.insert(symbol.clone(), json!({ "error": e.to_string() }));
                }
            }
        }
        Ok(ctp_envelope('○', Value::Object(out)))
    }

    // ---- exchange -------------------------------------------------------

    pub async fn exchange_place_order(
        &self,
        principal_id: &str,
        venue: Venue,
        symbol: &str,
        side: &str,
        order_type: &str,
        quantity: f64,
        price: Option<f64>,
    ) -> AppResult<Value> {
        let order = self
            .executor
            .execute_order(
                ExecuteOrderRequest {
                    principal_id: principal_id.to_string(),
                    venue,
                    symbol: symbol.to_string(),
                    side: side.to_string(),
                    order_type: order_type.to_string(),
                    quantity,
                    price,
                    source: "manual".to_string(),
                    ai_signal_id: None,
                },
                now_ts(),
            )
            .await?;

        self.events
            .publish(EngineEvent::ExchangeOrder {
                principal_id: principal_id.to_string(),
                order_id: order.id.clone(),
                status: format!("{:?}", order.status).to_lowercase(),
            })
            .await;

        Ok(ctp_envelope('○', json!({ "order": order })))
    }

    pub async fn exchange_cancel_order(&self, principal_id: &str, venue: Venue, order_id: &str) -> AppResult<Value> {
        let row = db::venue_orders::get(&self.db, order_id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::NotFound("order".to_string()))?;
        if row.principal_id != principal_id {
            return Err(AppError::AuthRequired);
        }
        let exchange_order_id = row
            .exchange_order_id
            .clone()
            .ok_or_else(|| AppError::Conflict("order was never submitted".to_string()))?;

        let client = self.executor.client(principal_id, venue).await?;
        client
            .cancel_order(&row.symbol, &exchange_order_id)
            .await
            .map_err(|e| AppError::VenueError(502, e.to_string()))?;
        db::venue_orders::mark_cancelled(&self.db, order_id).await.map_err(AppError::from)?;

        self.events
            .publish(EngineEvent::ExchangeOrder {
                principal_id: principal_id.to_string(),
                order_id: order_id.to_string(),
                status: "cancelled".to_string(),
            })
            .await;

        Ok(ctp_envelope('○', json!({ "orderId": order_id, "status": "cancelled" })))
    }

    pub async fn exchange_balance(&self, principal_id: &str, venue: Venue) -> AppResult<Value> {
        let client = self.executor.client(principal_id, venue).await?;
        let accounts = client.get_accounts().await.map_err(|e| AppError::VenueError(502, e.to_string()))?;
        Ok(ctp_envelope('○', json!({ "accounts": accounts })))
    }

    pub async fn exchange_open_orders(&self, principal_id: &str, venue: Venue, symbol: Option<&str>) -> AppResult<Value> {
        let client = self.executor.client(principal_id, venue).await?;
        let orders = client
            .get_open_orders(symbol)
            .await
            .map_err(|e| AppError::VenueError(502, e.to_string()))?;
        Ok(ctp_envelope('○', json!({ "orders": orders })))
    }

    pub async fn exchange_history(&self, principal_id: &str, limit: i64) -> AppResult<Value> {
        let orders = db::venue_orders::list_for_principal(&self.db, principal_id, limit)
            .await
            .map_err(AppError::from)?;
        Ok(ctp_envelope('○', json!({ "orders": orders })))
    }

    // ---- settings (venue API keys) -------------------------------------

    pub async fn settings_save_api_keys(&self, principal_id: &str, venue: Venue, access_key: &str, secret_key: &str) -> AppResult<Value> {
        let access = self.vault.encrypt(access_key)?;
        let secret = self.vault.encrypt(secret_key)?;
        db::keys::upsert(&self.db, principal_id, venue, &access, &secret)
            .await
            .map_err(AppError::from)?;
        self.executor.invalidate(principal_id, venue).await;

        Ok(ctp_envelope(
            '○',
            json!({
                "venue": venue_str(venue),
                "accessKey": vault::mask_access_key(access_key),
                "secretKey": vault::mask_secret_key(secret_key),
            }),
        ))
    }

    pub async fn settings_list_api_keys(&self, principal_id: &str) -> AppResult<Value> {
        let venues = db::keys::list_venues(&self.db, principal_id).await.map_err(AppError::from)?;
        let mut out = Vec::new();
        for venue in venues {
            if let Some(record) = db::keys::get(&self.db, principal_id, venue).await.map_err(AppError::from)? {
                if let (Ok(access), Ok(secret)) = (self.vault.decrypt(&record.access), self.vault.decrypt(&record.secret)) {
                    out.push(json!({
                        "venue": venue_str(venue),
                        "accessKey": vault::mask_access_key(&access),
                        "secretKey": vault::mask_secret_key(&secret),
                    }));
                }
            }
        }
        Ok(ctp_envelope('○', json!({ "keys": out })))
    }

    pub async fn settings_delete_api_keys(&self, principal_id: &str, venue: Venue) -> AppResult<Value> {
        db::keys::delete(&self.db, principal_id, venue).await.map_err(AppError::from)?;
        self.executor.invalidate(principal_id, venue).await;
        Ok(ctp_envelope('○', json!({ "venue": venue_str(venue), "deleted": true })))
    }

    // ---- events ---------------------------------------------------------

    pub async fn events_tail(&self, limit: usize) -> Vec<EngineEvent> {
        self.events.tail(limit).await
    }
}
