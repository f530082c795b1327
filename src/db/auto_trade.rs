//! `AutoTradeConfig` persistence.

use anyhow::Result;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use super::Db;
use crate::venues::Venue;

fn venue_str(v: Venue) -> &'static str {
    match v {
        Venue::UpbitLike => "upbit",
        Venue::BinanceLike => "binance",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoTradeConfig {
    pub enabled: bool,
    pub symbols: String,
    pub max_position_pct: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub min_confidence: f64,
    pub max_daily_trades: i64,
    pub daily_trades_used: i64,
    pub consecutive_losses: i64,
    pub max_consecutive_losses: i64,
}

impl Default for AutoTradeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            symbols: "BTCUSDT,ETHUSDT".to_string(),
            max_position_pct: 0.1,
            stop_loss_pct: 0.03,
            take_profit_pct: 0.06,
            min_confidence: 0.7,
            max_daily_trades: 10,
            daily_trades_used: 0,
            consecutive_losses: 0,
            max_consecutive_losses: 3,
        }
    }
}

pub async fn get(db: &Db, principal_id: &str, venue: Venue) -> Result<Option<AutoTradeConfig>> {
    let conn = db.lock().await;
    conn.query_row(
        "SELECT enabled, symbols, max_position_pct, stop_loss_pct, take_profit_pct, min_confidence,
                max_daily_trades, daily_trades_used, consecutive_losses, max_consecutive_losses
         FROM auto_trade_configs WHERE principal_id = ?1 AND venue = ?2",
        params![principal_id, venue_str(venue)],
        |row| {
            Ok(AutoTradeConfig {
                enabled: row.get::<_, i64>(0)? != 0,
                symbols: row.get(1)?,
                max_position_pct: row.get(2)?,
                stop_loss_pct: row.get(3)?,
                take_profit_pct: row.get(4)?,
                min_confidence: row.get(5)?,
                max_daily_trades: row.get(6)?,
                daily_trades_used: row.get(7)?,
                consecutive_losses: row.get(8)?,
                max_consecutive_losses: row.get(9)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

pub async fn upsert(db: &Db, principal_id: &str, venue: Venue, config: &AutoTradeConfig) -> Result<()> {
    let conn = db.lock().await;
    conn.execute(
        "INSERT INTO auto_trade_configs
            (principal_id, venue, enabled, symbols, max_position_pct, stop_loss_pct, take_profit_pct,
             min_confidence, max_daily_trades, daily_trades_used, consecutive_losses, max_consecutive_losses)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(principal_id, venue) DO UPDATE SET
            enabled = excluded.enabled,
            symbols = excluded.symbols,
            max_position_pct = excluded.max_position_pct,
            stop_loss_pct = excluded.stop_loss_pct,
            take_profit_pct = excluded.take_profit_pct,
            min_confidence = excluded.min_confidence,
            max_daily_trades = excluded.max_daily_trades,
            daily_trades_used = excluded.daily_trades_used,
            consecutive_losses = excluded.consecutive_losses,
            max_consecutive_losses = excluded.max_consecutive_losses",
        params![
            principal_id,
            venue_str(venue),
            config.enabled as i64,
            config.symbols,
            config.max_position_pct,
            config.stop_loss_pct,
            config.take_profit_pct,
            config.min_confidence,
            config.max_daily_trades,
            config.daily_trades_used,
            config.consecutive_losses,
            config.max_consecutive_losses,
        ],
    )?;
    Ok(())
}

pub async fn set_enabled(db: &Db, principal_id: &str, venue: Venue, enabled: bool) -> Result<()> {
    let conn = db.lock().await;
    conn.execute(
        "UPDATE auto_trade_configs SET enabled = ?3 WHERE principal_id = ?1 AND venue = ?2",
        params![principal_id, venue_str(venue), enabled as i64],
    )?;
    Ok(())
}

pub async fn increment_daily_trades(db: &Db, principal_id: &str, venue: Venue) -> Result<()> {
    let conn = db.lock().await;
    conn.execute(
        "UPDATE auto_trade_configs SET daily_trades_used = daily_trades_used + 1
         WHERE principal_id = ?1 AND venue = ?2",
        params![principal_id, venue_str(venue)],
    )?;
    Ok(())
}

pub async fn increment_consecutive_losses(db: &Db, principal_id: &str, venue: Venue) -> Result<()> {
    let conn = db.lock().await;
    conn.execute(
        "UPDATE auto_trade_configs SET consecutive_losses = consecutive_losses + 1
         WHERE principal_id = ?1 AND venue = ?2",
        params![principal_id, venue_str(venue)],
    )?;
    Ok(())
}

pub async fn reset_consecutive_losses(db: &Db, principal_id: &str, venue: Venue) -> Result<()> {
    let conn = db.lock().await;
    conn.execute(
        "UPDATE auto_trade_configs SET consecutive_losses = 0 WHERE principal_id = ?1 AND venue = ?2",
        params![principal_id, venue_str(venue)],
    )?;
    Ok(())
}

/// Reset every tuple's daily trade counter to zero. Called once per local
/// day by the gateway's midnight timer.
pub async fn reset_all_daily_trades(db: &Db) -> Result<usize> {
    let conn = db.lock().await;
    let n = conn.execute("UPDATE auto_trade_configs SET daily_trades_used = 0", [])?;
    Ok(n)
}

/// List every `(principal, venue)` tuple with `enabled = true`, for the
/// scheduler to rebuild its timer set after a restart.
pub async fn list_enabled(db: &Db) -> Result<Vec<(String, Venue)>> {
    let conn = db.lock().await;
    let mut stmt = conn.prepare("SELECT principal_id, venue FROM auto_trade_configs WHERE enabled = 1")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    let mut out = Vec::new();
    for row in rows {
        let (principal_id, venue) = row?;
        let venue = match venue.as_str() {
            "upbit" => Venue::UpbitLike,
            _ => Venue::BinanceLike,
        };
        out.push((principal_id, venue));
    }
    Ok(out)
}
