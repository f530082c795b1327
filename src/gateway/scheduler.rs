//! Auto-trade scheduler: a periodic per-`(principal, venue)` candle-pull ->
//! consensus -> risk-gate -> executor-submit loop, built on a per-job
//! `tokio::spawn` + `JoinHandle` registry generalized to multi-tenant
//! `(principal_id, venue)` keying, with a fixed-cadence per-symbol loop for
//! the cycle body.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, TimeZone, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::ai;
use crate::db;
use crate::error::AppError;
use crate::executor::ExecuteOrderRequest;
use crate::gateway::{EngineEvent, Gateway};
use crate::venues::market::to_venue_symbol;
use crate::venues::Venue;

const CYCLE_INTERVAL: Duration = Duration::from_secs(30);
const CANDLE_INTERVAL: &str = "1h";
const CANDLE_COUNT: u32 = 200;
const MIN_CANDLES: usize = 50;

fn venue_str(v: Venue) -> &'static str {
    match v {
        Venue::UpbitLike => "upbit",
        Venue::BinanceLike => "binance",
    }
}

/// Strip the quote suffix off a generic `"BTCUSDT"`-style symbol to get the
/// wallet token to size a SELL against (mirrors `market::to_venue_symbol`'s
/// suffix-stripping, kept separate since that one maps to a venue market
/// code rather than a wallet token).
fn base_symbol(symbol: &str) -> String {
    let upper = symbol.to_uppercase();
    upper
        .strip_suffix("USDT")
        .or_else(|| upper.strip_suffix("KRW"))
        .unwrap_or(&upper)
        .to_string()
}

/// Owns one live `tokio::spawn` timer per enabled `(principal_id, venue)`,
/// plus a single daily-reset timer. Held by the transport layer alongside
/// `Arc<Gateway>` rather than inside it, since building the scheduler needs
/// an already-constructed `Arc<Gateway>` to hand each cycle.
pub struct AutoTradeScheduler {
    gateway: Arc<Gateway>,
    timers: Mutex<HashMap<(String, Venue), JoinHandle<()>>>,
}

impl AutoTradeScheduler {
    pub fn new(gateway: Arc<Gateway>) -> Arc<Self> {
        Arc::new(Self {
            gateway,
            timers: Mutex::new(HashMap::new()),
        })
    }

    /// Rebuild every previously-enabled timer after a restart and start the
    /// daily reset timer. Call once at boot, after the gateway is wrapped in
    /// an `Arc`.
    pub async fn restore(self: &Arc<Self>) {
        match db::auto_trade::list_enabled(&self.gateway.db).await {
            Ok(rows) => {
                for (principal_id, venue) in rows {
                    info!(principal_id, venue = venue_str(venue), "restoring auto-trade timer");
                    self.spawn_timer(principal_id, venue).await;
                }
            }
            Err(e) => error!(error = %e, "failed to list enabled auto-trade configs at startup"),
        }
        self.spawn_daily_reset();
    }

    /// Enable auto-trading for `(principal_id, venue)`. Requires the
    /// principal to already have venue API keys on file; idempotent if
    /// already enabled.
    pub async fn enable(self: &Arc<Self>, principal_id: &str, venue: Venue) -> Result<(), AppError> {
        db::keys::get(&self.gateway.db, principal_id, venue)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::NotFound("key".to_string()))?;

        let mut config = db::auto_trade::get(&self.gateway.db, principal_id, venue)
            .await
            .map_err(AppError::from)?
            .unwrap_or_default();
        if config.enabled {
            return Ok(());
        }
        config.enabled = true;
        db::auto_trade::upsert(&self.gateway.db, principal_id, venue, &config)
            .await
            .map_err(AppError::from)?;
        self.spawn_timer(principal_id.to_string(), venue).await;
        Ok(())
    }

    pub async fn disable(&self, principal_id: &str, venue: Venue) -> Result<(), AppError> {
        db::auto_trade::set_enabled(&self.gateway.db, principal_id, venue, false)
            .await
            .map_err(AppError::from)?;
        if let Some(handle) = self.timers.lock().await.remove(&(principal_id.to_string(), venue)) {
            handle.abort();
        }
        Ok(())
    }

    pub async fn is_running(&self, principal_id: &str, venue: Venue) -> bool {
        self.timers.lock().await.contains_key(&(principal_id.to_string(), venue))
    }

    async fn spawn_timer(self: &Arc<Self>, principal_id: String, venue: Venue) {
        let mut timers = self.timers.lock().await;
        let key = (principal_id.clone(), venue);
        if timers.contains_key(&key) {
            return;
        }
        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CYCLE_INTERVAL);
            ticker.tick().await; // first tick fires immediately; skip the 0s freebie
            loop {
                ticker.tick().await;
                scheduler.run_cycle(&principal_id, venue).await;
            }
        });
        timers.insert(key, handle);
    }

    /// Spawn the one-shot-then-recurring timer that resets every enabled
    /// config's `daily_trades_used` at local midnight.
    fn spawn_daily_reset(self: &Arc<Self>) {
        let gateway = self.gateway.clone();
        tokio::spawn(async move {
            loop {
                let now = Utc::now().with_timezone(&Local);
                let midnight_naive = (now.date_naive() + chrono::Duration::days(1)).and_hms_opt(0, 0, 0).unwrap();
                let next_midnight = Local
                    .from_local_datetime(&midnight_naive)
                    .single()
                    .unwrap_or_else(|| now + chrono::Duration::hours(24));
                let wait = (next_midnight - now).to_std().unwrap_or(Duration::from_secs(86_400));
                tokio::time::sleep(wait).await;

                match db::auto_trade::reset_all_daily_trades(&gateway.db).await {
                    Ok(n) => info!(reset = n, "daily auto-trade counters reset"),
                    Err(e) => error!(error = %e, "failed to reset daily auto-trade counters"),
                }
            }
        });
    }

    async fn run_cycle(&self, principal_id: &str, venue: Venue) {
        let config = match db::auto_trade::get(&self.gateway.db, principal_id, venue).await {
            Ok(Some(c)) if c.enabled => c,
            Ok(_) => return,
            Err(e) => {
                warn!(error = %e, principal_id, "failed to load auto-trade config for cycle");
                return;
            }
        };

        for symbol in config.symbols.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if let Err(e) = self.run_symbol_cycle(principal_id, venue, symbol).await {
                warn!(error = %e, principal_id, venue = venue_str(venue), symbol, "auto-trade cycle failed");
                self.gateway
                    .events
                    .publish(EngineEvent::AutoError {
                        principal_id: principal_id.to_string(),
                        venue: venue_str(venue).to_string(),
                        error: e.truncated(),
                    })
                    .await;
            }
        }
    }

    async fn run_symbol_cycle(&self, principal_id: &str, venue: Venue, symbol: &str) -> Result<(), AppError> {
        let market_symbol = to_venue_symbol(venue, symbol);
        let candles = self
            .gateway
            .market
            .fetch_candles(venue, &market_symbol, CANDLE_INTERVAL, CANDLE_COUNT)
            .await
            .map_err(|e| AppError::VenueError(502, e.to_string()))?;
        if candles.len() < MIN_CANDLES {
            return Ok(());
        }

        let price = candles.last().unwrap().close;
        let balances = db::wallets::all_balances(&self.gateway.db, principal_id).await?;
        let total_balance: u128 = balances.iter().map(|(_, w)| w.balance).sum();

        let risk_key = format!("{principal_id}:{}:{symbol}", venue_str(venue));
        let consensus = ai::analyze(&candles, &self.gateway.risk, &risk_key, price, total_balance as f64);

        if consensus.decision == ai::Decision::Hold {
            return Ok(());
        }

        // Re-read the config: daily/consecutive-loss counters may have moved
        // between the candle fetch above and now.
        let config = db::auto_trade::get(&self.gateway.db, principal_id, venue)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::NotFound("auto-trade config".to_string()))?;
        if !config.enabled {
            return Ok(());
        }
        if consensus.avg_confidence < config.min_confidence {
            return Ok(());
        }
        if !consensus.risk.allowed {
            return Ok(());
        }
        if config.daily_trades_used >= config.max_daily_trades {
            return Ok(());
        }
        if config.consecutive_losses >= config.max_consecutive_losses {
            self.gateway
                .events
                .publish(EngineEvent::AutoTradePaused {
                    principal_id: principal_id.to_string(),
                    venue: venue_str(venue).to_string(),
                    reason: "consecutive-loss circuit breaker tripped".to_string(),
                })
                .await;
            return Ok(());
        }

        let side = match consensus.decision {
            ai::Decision::Buy => "buy",
            ai::Decision::Sell => "sell",
            ai::Decision::Hold => return Ok(()),
        };

        let base_token = base_symbol(symbol);
        let quote_balance = balances.iter().find(|(t, _)| t == "USDT").map(|(_, w)| w.balance).unwrap_or(0);
        let base_balance = balances.iter().find(|(t, _)| *t == base_token).map(|(_, w)| w.balance).unwrap_or(0);

        let quantity = if side == "buy" {
            let notional = quote_balance as f64 * config.max_position_pct;
            (notional / price * 100.0).floor() / 100.0
        } else {
            (base_balance as f64 * config.max_position_pct * 1000.0).floor() / 1000.0
        };
        if quantity <= 0.0 {
            return Ok(());
        }

        let signal_id = uuid::Uuid::new_v4().to_string();
        db::signals::append(
            &self.gateway.db,
            db::signals::NewSignal {
                id: signal_id.clone(),
                symbol: symbol.to_string(),
                venue: venue_str(venue).to_string(),
                interval: CANDLE_INTERVAL.to_string(),
                signal: side.to_uppercase(),
                score: consensus.score,
                confidence: consensus.avg_confidence,
                trit: consensus.decision.trit(),
                strategies_json: serde_json::to_string(&consensus.strategies)
                    .map_err(|e| AppError::Internal(e.to_string()))?,
                risk_json: serde_json::to_string(&consensus.risk).map_err(|e| AppError::Internal(e.to_string()))?,
                created_at: Utc::now().timestamp(),
            },
        )
        .await
        .map_err(AppError::from)?;

        self.gateway
            .executor
            .execute_order(
                ExecuteOrderRequest {
                    principal_id: principal_id.to_string(),
                    venue,
                    symbol: symbol.to_string(),
                    side: side.to_string(),
                    order_type: "market".to_string(),
                    quantity,
                    price: Some(price),
                    source: "auto".to_string(),
                    ai_signal_id: Some(signal_id),
                },
                Utc::now().timestamp(),
            )
            .await?;

        self.gateway
            .executor
            .reconcile_fill(principal_id, venue, symbol, side, price)
            .await?;

        self.gateway
            .events
            .publish(EngineEvent::AutoTrade {
                principal_id: principal_id.to_string(),
                venue: venue_str(venue).to_string(),
                symbol: symbol.to_string(),
                decision: side.to_uppercase(),
            })
            .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_symbol_strips_quote_suffix() {
        assert_eq!(base_symbol("BTCUSDT"), "BTC");
        assert_eq!(base_symbol("ETHKRW"), "ETH");
        assert_eq!(base_symbol("TRIT"), "TRIT");
    }
}
