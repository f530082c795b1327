use anyhow::Result;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use super::Db;

#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: String,
    pub created_at: i64,
    pub last_login: Option<i64>,
}

pub struct NewUser {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: i64,
}

/// Insert a new principal. Fails with a unique-constraint violation if the
/// email or username is already taken (surfaced by the caller as
/// `AppError::Conflict`).
pub async fn create_user(db: &Db, user: NewUser) -> Result<Principal> {
    let conn = db.lock().await;
    conn.execute(
        "INSERT INTO users (id, email, username, password_hash, role, created_at) VALUES (?1, ?2, ?3, ?4, 'user', ?5)",
        params![user.id, user.email, user.username, user.password_hash, user.created_at],
    )?;
    Ok(Principal {
        id: user.id,
        email: user.email,
        username: user.username,
        role: "user".to_string(),
        created_at: user.created_at,
        last_login: None,
    })
}

pub async fn find_credentials(db: &Db, email_or_username: &str) -> Result<Option<(Principal, String)>> {
    let conn = db.lock().await;
    conn.query_row(
        "SELECT id, email, username, role, created_at, last_login, password_hash
         FROM users WHERE email = ?1 OR username = ?1",
        params![email_or_username],
        |row| {
            Ok((
                Principal {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    username: row.get(2)?,
                    role: row.get(3)?,
                    created_at: row.get(4)?,
                    last_login: row.get(5)?,
                },
                row.get::<_, String>(6)?,
            ))
        },
    )
    .optional()
    .map_err(Into::into)
}

pub async fn get_by_id(db: &Db, id: &str) -> Result<Option<Principal>> {
    let conn = db.lock().await;
    conn.query_row(
        "SELECT id, email, username, role, created_at, last_login FROM users WHERE id = ?1",
        params![id],
        |row| {
            Ok(Principal {
                id: row.get(0)?,
                email: row.get(1)?,
                username: row.get(2)?,
                role: row.get(3)?,
                created_at: row.get(4)?,
                last_login: row.get(5)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

pub async fn touch_last_login(db: &Db, id: &str, at: i64) -> Result<()> {
    let conn = db.lock().await;
    conn.execute("UPDATE users SET last_login = ?1 WHERE id = ?2", params![at, id])?;
    Ok(())
}
