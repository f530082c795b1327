//! `VenueOrder` persistence: lifecycle transitions are constrained to
//! `pending -> {submitted, failed}` and `submitted -> {filled, cancelled}`;
//! no row leaves a terminal state.

use anyhow::Result;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use super::Db;
use crate::venues::Venue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VenueOrderStatus {
    Pending,
    Submitted,
    Filled,
    Cancelled,
    Failed,
}

impl VenueOrderStatus {
    fn as_str(self) -> &'static str {
        match self {
            VenueOrderStatus::Pending => "pending",
            VenueOrderStatus::Submitted => "submitted",
            VenueOrderStatus::Filled => "filled",
            VenueOrderStatus::Cancelled => "cancelled",
            VenueOrderStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "submitted" => VenueOrderStatus::Submitted,
            "filled" => VenueOrderStatus::Filled,
            "cancelled" => VenueOrderStatus::Cancelled,
            "failed" => VenueOrderStatus::Failed,
            _ => VenueOrderStatus::Pending,
        }
    }
}

fn venue_str(v: Venue) -> &'static str {
    match v {
        Venue::UpbitLike => "upbit",
        Venue::BinanceLike => "binance",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VenueOrderRow {
    pub id: String,
    pub principal_id: String,
    pub venue: String,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub price: Option<f64>,
    pub quantity: f64,
    pub status: VenueOrderStatus,
    pub exchange_order_id: Option<String>,
    pub filled_qty: f64,
    pub filled_price: Option<f64>,
    pub fee: f64,
    pub source: String,
    pub ai_signal_id: Option<String>,
    pub error: Option<String>,
    pub created_at: i64,
}

pub struct NewVenueOrder {
    pub id: String,
    pub principal_id: String,
    pub venue: Venue,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub price: Option<f64>,
    pub quantity: f64,
    pub source: String,
    pub ai_signal_id: Option<String>,
    pub created_at: i64,
}

pub async fn insert_pending(db: &Db, order: NewVenueOrder) -> Result<()> {
    let conn = db.lock().await;
    conn.execute(
        "INSERT INTO venue_orders
            (id, principal_id, venue, symbol, side, order_type, price, quantity, status, source, ai_signal_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', ?9, ?10, ?11)",
        params![
            order.id,
            order.principal_id,
            venue_str(order.venue),
            order.symbol,
            order.side,
            order.order_type,
            order.price,
            order.quantity,
            order.source,
            order.ai_signal_id,
            order.created_at,
        ],
    )?;
    Ok(())
}

pub async fn mark_submitted(
    db: &Db,
    id: &str,
    exchange_order_id: &str,
    filled_qty: f64,
    filled_price: Option<f64>,
) -> Result<()> {
    let conn = db.lock().await;
    conn.execute(
        "UPDATE venue_orders SET status = 'submitted', exchange_order_id = ?2, filled_qty = ?3, filled_price = ?4
         WHERE id = ?1 AND status = 'pending'",
        params![id, exchange_order_id, filled_qty, filled_price],
    )?;
    Ok(())
}

pub async fn mark_failed(db: &Db, id: &str, error: &str) -> Result<()> {
    let conn = db.lock().await;
    conn.execute(
        "UPDATE venue_orders SET status = 'failed', error = ?2 WHERE id = ?1 AND status = 'pending'",
        params![id, error],
    )?;
    Ok(())
}

pub async fn mark_filled(db: &Db, id: &str, filled_qty: f64, filled_price: f64, fee: f64) -> Result<()> {
    let conn = db.lock().await;
    conn.execute(
        "UPDATE venue_orders SET status = 'filled', filled_qty = ?2, filled_price = ?3, fee = ?4
         WHERE id = ?1 AND status = 'submitted'",
        params![id, filled_qty, filled_price, fee],
    )?;
    Ok(())
}

pub async fn mark_cancelled(db: &Db, id: &str) -> Result<()> {
    let conn = db.lock().await;
    conn.execute(
        "UPDATE venue_orders SET status = 'cancelled' WHERE id = ?1 AND status = 'submitted'",
        params![id],
    )?;
    Ok(())
}

pub async fn get(db: &Db, id: &str) -> Result<Option<VenueOrderRow>> {
    let conn = db.lock().await;
    conn.query_row(
        "SELECT id, principal_id, venue, symbol, side, order_type, price, quantity, status,
                exchange_order_id, filled_qty, filled_price, fee, source, ai_signal_id, error, created_at
         FROM venue_orders WHERE id = ?1",
        params![id],
        row_to_order,
    )
    .optional()
    .map_err(Into::into)
}

pub async fn list_for_principal(db: &Db, principal_id: &str, limit: i64) -> Result<Vec<VenueOrderRow>> {
    let conn = db.lock().await;
    let mut stmt = conn.prepare(
        "SELECT id, principal_id, venue, symbol, side, order_type, price, quantity, status,
                exchange_order_id, filled_qty, filled_price, fee, source, ai_signal_id, error, created_at
         FROM venue_orders WHERE principal_id = ?1 ORDER BY created_at DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![principal_id, limit], row_to_order)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn row_to_order(row: &rusqlite::Row<'_>) -> rusqlite::Result<VenueOrderRow> {
    Ok(VenueOrderRow {
        id: row.get(0)?,
        principal_id: row.get(1)?,
        venue: row.get(2)?,
        symbol: row.get(3)?,
        side: row.get(4)?,
        order_type: row.get(5)?,
        price: row.get(6)?,
        quantity: row.get(7)?,
        status: VenueOrderStatus::parse(&row.get::<_, String>(8)?),
        exchange_order_id: row.get(9)?,
        filled_qty: row.get(10)?,
        filled_price: row.get(11)?,
        fee: row.get(12)?,
        source: row.get(13)?,
        ai_signal_id: row.get(14)?,
        error: row.get(15)?,
        created_at: row.get(16)?,
    })
}
