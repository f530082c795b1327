use anyhow::Result;
use rusqlite::{params, OptionalExtension};

use super::Db;

pub async fn create(db: &Db, token: &str, principal_id: &str, created_at: i64, expires_at: i64) -> Result<()> {
    let conn = db.lock().await;
    conn.execute(
        "INSERT INTO sessions (token, principal_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![token, principal_id, created_at, expires_at],
    )?;
    Ok(())
}

/// Look up the owning principal for a still-valid session token.
pub async fn principal_for_token(db: &Db, token: &str, now: i64) -> Result<Option<String>> {
    let conn = db.lock().await;
    conn.query_row(
        "SELECT principal_id FROM sessions WHERE token = ?1 AND expires_at > ?2",
        params![token, now],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

pub async fn revoke(db: &Db, token: &str) -> Result<()> {
    let conn = db.lock().await;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Delete every session that has expired as of `now`.
pub async fn sweep_expired(db: &Db, now: i64) -> Result<usize> {
    let conn = db.lock().await;
    let n = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?;
    Ok(n)
}
