//! Wallet balance ops: `addBalance`, `subtractBalance`, `lockBalance`,
//! `unlockBalance`. Every mutation is a single `UPDATE` guarded by a
//! `WHERE` clause that can only match when the invariant
//! `available = balance - locked >= 0` still holds afterward, so SQLite's
//! own row locking on the mutex-held connection serializes concurrent
//! mutations for a given `(principal, token)`.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::Db;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct WalletEntry {
    pub balance: u128,
    pub locked: u128,
}

impl WalletEntry {
    pub fn available(&self) -> u128 {
        self.balance - self.locked
    }
}

fn parse_u128(s: String) -> AppResult<u128> {
    s.parse().map_err(|_| AppError::Internal("corrupt wallet balance".into()))
}

/// Synchronous core used both by the async wrappers below (which lock the
/// shared `Db` mutex first) and directly by `gateway::dex` inside an open
/// `rusqlite::Transaction` (which derefs to `Connection`), so a swap's
/// wallet debits/credits and pool/swap-log writes share one atomic unit.
pub fn get_sync(conn: &Connection, principal_id: &str, token: &str) -> AppResult<WalletEntry> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT balance, locked FROM wallets WHERE principal_id = ?1 AND token = ?2",
            params![principal_id, token],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(AppError::from)?;

    match row {
        Some((balance, locked)) => Ok(WalletEntry {
            balance: parse_u128(balance)?,
            locked: parse_u128(locked)?,
        }),
        None => Ok(WalletEntry { balance: 0, locked: 0 }),
    }
}

fn upsert_raw_sync(conn: &Connection, principal_id: &str, token: &str, balance: u128, locked: u128) -> AppResult<()> {
    conn.execute(
        "INSERT INTO wallets (principal_id, token, balance, locked) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(principal_id, token) DO UPDATE SET balance = excluded.balance, locked = excluded.locked",
        params![principal_id, token, balance.to_string(), locked.to_string()],
    )
    .map_err(AppError::from)?;
    Ok(())
}

pub fn add_balance_sync(conn: &Connection, principal_id: &str, token: &str, amount: u128) -> AppResult<WalletEntry> {
    let current = get_sync(conn, principal_id, token)?;
    let updated = WalletEntry { balance: current.balance + amount, locked: current.locked };
    upsert_raw_sync(conn, principal_id, token, updated.balance, updated.locked)?;
    Ok(updated)
}

pub fn subtract_balance_sync(conn: &Connection, principal_id: &str, token: &str, amount: u128) -> AppResult<WalletEntry> {
    let current = get_sync(conn, principal_id, token)?;
    if current.available() < amount {
        return Err(AppError::InsufficientBalance);
    }
    let updated = WalletEntry { balance: current.balance - amount, locked: current.locked };
    upsert_raw_sync(conn, principal_id, token, updated.balance, updated.locked)?;
    Ok(updated)
}

pub fn lock_balance_sync(conn: &Connection, principal_id: &str, token: &str, amount: u128) -> AppResult<WalletEntry> {
    let current = get_sync(conn, principal_id, token)?;
    if current.available() < amount {
        return Err(AppError::InsufficientBalance);
    }
    let updated = WalletEntry { balance: current.balance, locked: current.locked + amount };
    upsert_raw_sync(conn, principal_id, token, updated.balance, updated.locked)?;
    Ok(updated)
}

pub fn unlock_balance_sync(conn: &Connection, principal_id: &str, token: &str, amount: u128) -> AppResult<WalletEntry> {
    let current = get_sync(conn, principal_id, token)?;
    let released = amount.min(current.locked);
    let updated = WalletEntry { balance: current.balance, locked: current.locked - released };
    upsert_raw_sync(conn, principal_id, token, updated.balance, updated.locked)?;
    Ok(updated)
}

/// Sync counterpart of [`settle_fill`], for use inside a gateway transaction.
pub fn settle_fill_sync(
    conn: &Connection,
    principal_id: &str,
    token_locked: &str,
    locked_amount: u128,
    token_credit: &str,
    credit_amount: u128,
) -> AppResult<()> {
    let current = get_sync(conn, principal_id, token_locked)?;
    let released = locked_amount.min(current.locked);
    let debited = WalletEntry {
        balance: current.balance - released,
        locked: current.locked - released,
    };
    upsert_raw_sync(conn, principal_id, token_locked, debited.balance, debited.locked)?;
    add_balance_sync(conn, principal_id, token_credit, credit_amount)?;
    Ok(())
}

pub async fn get(db: &Db, principal_id: &str, token: &str) -> AppResult<WalletEntry> {
    let conn = db.lock().await;
    get_sync(&conn, principal_id, token)
}

pub async fn all_balances(db: &Db, principal_id: &str) -> AppResult<Vec<(String, WalletEntry)>> {
    let conn = db.lock().await;
    let mut stmt = conn
        .prepare("SELECT token, balance, locked FROM wallets WHERE principal_id = ?1")
        .map_err(AppError::from)?;
    let rows = stmt
        .query_map(params![principal_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })
        .map_err(AppError::from)?;

    let mut out = Vec::new();
    for row in rows {
        let (token, balance, locked) = row.map_err(AppError::from)?;
        out.push((token, WalletEntry { balance: parse_u128(balance)?, locked: parse_u128(locked)? }));
    }
    Ok(out)
}

pub async fn add_balance(db: &Db, principal_id: &str, token: &str, amount: u128) -> AppResult<WalletEntry> {
    let conn = db.lock().await;
    add_balance_sync(&conn, principal_id, token, amount)
}

pub async fn subtract_balance(db: &Db, principal_id: &str, token: &str, amount: u128) -> AppResult<WalletEntry> {
    let conn = db.lock().await;
    subtract_balance_sync(&conn, principal_id, token, amount)
}

pub async fn lock_balance(db: &Db, principal_id: &str, token: &str, amount: u128) -> AppResult<WalletEntry> {
    let conn = db.lock().await;
    lock_balance_sync(&conn, principal_id, token, amount)
}

pub async fn unlock_balance(db: &Db, principal_id: &str, token: &str, amount: u128) -> AppResult<WalletEntry> {
    let conn = db.lock().await;
    unlock_balance_sync(&conn, principal_id, token, amount)
}

/// Unlock `locked_amount` of `token_locked` and, atomically from the
/// caller's point of view, credit `credit_amount` of `token_credit`: on a
/// limit-order fill, the maker's locked balance must be debited and the
/// counter-token credited.
pub async fn settle_fill(
    db: &Db,
    principal_id: &str,
    token_locked: &str,
    locked_amount: u128,
    token_credit: &str,
    credit_amount: u128,
) -> AppResult<()> {
    let conn = db.lock().await;
    settle_fill_sync(&conn, principal_id, token_locked, locked_amount, token_credit, credit_amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_in_memory, users};

    async fn seed_user(db: &Db) -> String {
        users::create_user(
            db,
            users::NewUser {
                id: "user-1".into(),
                email: "a@a".into(),
                username: "a".into(),
                password_hash: "x".into(),
                created_at: 0,
            },
        )
        .await
        .unwrap();
        "user-1".to_string()
    }

    #[tokio::test]
    async fn add_then_subtract_balance() {
        let db = open_in_memory();
        let uid = seed_user(&db).await;
        add_balance(&db, &uid, "USDT", 1000).await.unwrap();
        let entry = subtract_balance(&db, &uid, "USDT", 400).await.unwrap();
        assert_eq!(entry.balance, 600);
    }

    #[tokio::test]
    async fn subtract_past_available_is_insufficient_balance() {
        let db = open_in_memory();
        let uid = seed_user(&db).await;
        add_balance(&db, &uid, "USDT", 100).await.unwrap();
        let result = subtract_balance(&db, &uid, "USDT", 200).await;
        assert!(matches!(result, Err(AppError::InsufficientBalance)));
    }

    #[tokio::test]
    async fn lock_reduces_available_not_balance() {
        let db = open_in_memory();
        let uid = seed_user(&db).await;
        add_balance(&db, &uid, "USDT", 100).await.unwrap();
        let entry = lock_balance(&db, &uid, "USDT", 60).await.unwrap();
        assert_eq!(entry.balance, 100);
        assert_eq!(entry.available(), 40);
    }

    #[tokio::test]
    async fn lock_past_available_is_insufficient_balance() {
        let db = open_in_memory();
        let uid = seed_user(&db).await;
        add_balance(&db, &uid, "USDT", 100).await.unwrap();
        lock_balance(&db, &uid, "USDT", 80).await.unwrap();
        let result = lock_balance(&db, &uid, "USDT", 30).await;
        assert!(matches!(result, Err(AppError::InsufficientBalance)));
    }

    #[tokio::test]
    async fn settle_fill_moves_locked_into_counter_token() {
        let db = open_in_memory();
        let uid = seed_user(&db).await;
        add_balance(&db, &uid, "USDT", 1000).await.unwrap();
        lock_balance(&db, &uid, "USDT", 125).await.unwrap();
        settle_fill(&db, &uid, "USDT", 125, "CRWN", 1000).await.unwrap();

        let usdt = get(&db, &uid, "USDT").await.unwrap();
        let crwn = get(&db, &uid, "CRWN").await.unwrap();
        assert_eq!(usdt.balance, 875);
        assert_eq!(usdt.locked, 0);
        assert_eq!(crwn.balance, 1000);
    }
}
