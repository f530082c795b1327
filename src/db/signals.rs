use anyhow::Result;
use rusqlite::params;

use super::Db;

pub struct NewSignal {
    pub id: String,
    pub symbol: String,
    pub venue: String,
    pub interval: String,
    pub signal: String,
    pub score: f64,
    pub confidence: f64,
    pub trit: char,
    pub strategies_json: String,
    pub risk_json: String,
    pub created_at: i64,
}

pub async fn append(db: &Db, signal: NewSignal) -> Result<()> {
    let conn = db.lock().await;
    conn.execute(
        "INSERT INTO ai_signals (id, symbol, venue, interval, signal, score, confidence, trit, strategies, risk, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            signal.id,
            signal.symbol,
            signal.venue,
            signal.interval,
            signal.signal,
            signal.score,
            signal.confidence,
            signal.trit.to_string(),
            signal.strategies_json,
            signal.risk_json,
            signal.created_at,
        ],
    )?;
    Ok(())
}
