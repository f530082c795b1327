//! Durable mirror of in-memory DEX state: `savePool` snapshots a pool's
//! reserves and LP holder table, `saveOrder` mirrors a limit order, and
//! `recordSwap`/`tailSwaps` maintain the append-only swap log. The live,
//! authoritative state lives in `DexEngine`; these are writes-after-the-
//! fact so a restart can rehydrate history.

use anyhow::Result;
use rusqlite::{params, Connection};
use serde::Serialize;

use super::Db;
use crate::dex::orderbook::{LimitOrder, OrderSide, OrderStatus};
use crate::dex::pool::{ImpactTrit, Pool, SwapRecord};

/// Sync core, callable both from the async wrapper below and directly
/// inside a `gateway`-owned `rusqlite::Transaction` (which derefs to
/// `Connection`) so a swap's pool snapshot lands in the same atomic unit
/// as its wallet mutations and swap-log entry.
pub fn save_pool_sync(conn: &Connection, pool: &Pool) -> Result<()> {
    conn.execute(
        "INSERT INTO pools (id, token_a, token_b, reserve_a, reserve_b, fee_bps, total_lp_shares, swap_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
            reserve_a = excluded.reserve_a,
            reserve_b = excluded.reserve_b,
            total_lp_shares = excluded.total_lp_shares,
            swap_count = excluded.swap_count",
        params![
            pool.id,
            pool.token_a,
            pool.token_b,
            pool.reserve_a.to_string(),
            pool.reserve_b.to_string(),
            pool.fee_bps,
            pool.total_lp_shares.to_string(),
            pool.swap_count as i64,
        ],
    )?;

    conn.execute("DELETE FROM lp_holders WHERE pool_id = ?1", params![pool.id])?;
    for (holder, shares) in &pool.lp_holders {
        conn.execute(
            "INSERT INTO lp_holders (pool_id, principal_id, shares) VALUES (?1, ?2, ?3)",
            params![pool.id, holder, shares.to_string()],
        )?;
    }
    Ok(())
}

fn side_str(s: OrderSide) -> &'static str {
    match s {
        OrderSide::Buy => "buy",
        OrderSide::Sell => "sell",
    }
}

fn status_str(s: OrderStatus) -> &'static str {
    match s {
        OrderStatus::Open => "open",
        OrderStatus::PartiallyFilled => "partial",
        OrderStatus::Filled => "filled",
        OrderStatus::Cancelled => "cancelled",
    }
}

pub fn save_order_sync(conn: &Connection, order: &LimitOrder) -> Result<()> {
    conn.execute(
        "INSERT INTO limit_orders (id, owner, pool_id, side, price, amount, filled, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET filled = excluded.filled, status = excluded.status",
        params![
            order.id,
            order.owner,
            order.market,
            side_str(order.side),
            order.price,
            order.amount,
            order.filled,
            status_str(order.status),
            order.created_at,
        ],
    )?;
    Ok(())
}

pub async fn save_pool(db: &Db, pool: &Pool) -> Result<()> {
    let conn = db.lock().await;
    save_pool_sync(&conn, pool)
}

pub async fn save_order(db: &Db, order: &LimitOrder) -> Result<()> {
    let conn = db.lock().await;
    save_order_sync(&conn, order)
}

fn trit_str(t: ImpactTrit) -> &'static str {
    match t {
        ImpactTrit::Precise => "P",
        ImpactTrit::Ordinary => "O",
        ImpactTrit::Turbulent => "T",
    }
}

pub fn record_swap_sync(
    conn: &Connection,
    principal_id: &str,
    token_in: &str,
    token_out: &str,
    record: &SwapRecord,
    created_at: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO swaps (principal_id, pool_id, token_in, token_out, amount_in, amount_out, fee, price_impact, trit, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            principal_id,
            record.pool_id,
            token_in,
            token_out,
            record.amount_in.to_string(),
            record.amount_out.to_string(),
            record.fee.to_string(),
            record.price_impact,
            trit_str(record.trit),
            created_at,
        ],
    )?;
    Ok(())
}

pub async fn record_swap(
    db: &Db,
    principal_id: &str,
    token_in: &str,
    token_out: &str,
    record: &SwapRecord,
    created_at: i64,
) -> Result<()> {
    let conn = db.lock().await;
    record_swap_sync(&conn, principal_id, token_in, token_out, record, created_at)
}

#[derive(Debug, Clone, Serialize)]
pub struct SwapRow {
    pub principal_id: String,
    pub pool_id: String,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: String,
    pub amount_out: String,
    pub fee: String,
    pub price_impact: f64,
    pub trit: String,
    pub created_at: i64,
}

pub async fn tail_swaps(db: &Db, limit: i64) -> Result<Vec<SwapRow>> {
    let conn = db.lock().await;
    let mut stmt = conn.prepare(
        "SELECT principal_id, pool_id, token_in, token_out, amount_in, amount_out, fee, price_impact, trit, created_at
         FROM swaps ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(SwapRow {
            principal_id: row.get(0)?,
            pool_id: row.get(1)?,
            token_in: row.get(2)?,
            token_out: row.get(3)?,
            amount_in: row.get(4)?,
            amount_out: row.get(5)?,
            fee: row.get(6)?,
            price_impact: row.get(7)?,
            trit: row.get(8)?,
            created_at: row.get(9)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
