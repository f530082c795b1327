//! Venue API key records. Each key is AEAD-sealed independently by
//! `vault::KeyVault` before it reaches this layer; the combined
//! `iv`/`auth_tag` columns here are a storage convenience
//! (`"ivAccess:ivSecret"`), never a second encryption pass.

use anyhow::Result;
use rusqlite::{params, OptionalExtension};

use super::Db;
use crate::vault::EncryptedSecret;
use crate::venues::Venue;

fn venue_key(venue: Venue) -> &'static str {
    match venue {
        Venue::UpbitLike => "upbit",
        Venue::BinanceLike => "binance",
    }
}

fn parse_venue(s: &str) -> Option<Venue> {
    match s {
        "upbit" => Some(Venue::UpbitLike),
        "binance" => Some(Venue::BinanceLike),
        _ => None,
    }
}

pub struct KeyRecordRow {
    pub access: EncryptedSecret,
    pub secret: EncryptedSecret,
}

pub async fn upsert(
    db: &Db,
    principal_id: &str,
    venue: Venue,
    access: &EncryptedSecret,
    secret: &EncryptedSecret,
) -> Result<()> {
    let conn = db.lock().await;
    let iv = format!("{}:{}", access.iv_hex, secret.iv_hex);
    let tag = format!("{}:{}", access.tag_hex, secret.tag_hex);
    conn.execute(
        "INSERT INTO key_records (principal_id, venue, access_cipher, secret_cipher, iv, auth_tag)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(principal_id, venue) DO UPDATE SET
            access_cipher = excluded.access_cipher,
            secret_cipher = excluded.secret_cipher,
            iv = excluded.iv,
            auth_tag = excluded.auth_tag",
        params![principal_id, venue_key(venue), access.cipher_hex, secret.cipher_hex, iv, tag],
    )?;
    Ok(())
}

pub async fn get(db: &Db, principal_id: &str, venue: Venue) -> Result<Option<KeyRecordRow>> {
    let conn = db.lock().await;
    conn.query_row(
        "SELECT access_cipher, secret_cipher, iv, auth_tag FROM key_records WHERE principal_id = ?1 AND venue = ?2",
        params![principal_id, venue_key(venue)],
        |row| {
            let access_cipher: String = row.get(0)?;
            let secret_cipher: String = row.get(1)?;
            let iv: String = row.get(2)?;
            let tag: String = row.get(3)?;
            Ok((access_cipher, secret_cipher, iv, tag))
        },
    )
    .optional()?
    .map(|(access_cipher, secret_cipher, iv, tag)| {
        let (iv_a, iv_s) = iv.split_once(':').ok_or_else(|| anyhow::anyhow!("corrupt iv column"))?;
        let (tag_a, tag_s) = tag.split_once(':').ok_or_else(|| anyhow::anyhow!("corrupt tag column"))?;
        Ok(KeyRecordRow {
            access: EncryptedSecret { cipher_hex: access_cipher, iv_hex: iv_a.to_string(), tag_hex: tag_a.to_string() },
            secret: EncryptedSecret { cipher_hex: secret_cipher, iv_hex: iv_s.to_string(), tag_hex: tag_s.to_string() },
        })
    })
    .transpose()
}

pub async fn delete(db: &Db, principal_id: &str, venue: Venue) -> Result<()> {
    let conn = db.lock().await;
    conn.execute(
        "DELETE FROM key_records WHERE principal_id = ?1 AND venue = ?2",
        params![principal_id, venue_key(venue)],
    )?;
    Ok(())
}

pub async fn list_venues(db: &Db, principal_id: &str) -> Result<Vec<Venue>> {
    let conn = db.lock().await;
    let mut stmt = conn.prepare("SELECT venue FROM key_records WHERE principal_id = ?1")?;
    let rows = stmt.query_map(params![principal_id], |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for row in rows {
        if let Some(v) = parse_venue(&row?) {
            out.push(v);
        }
    }
    Ok(out)
}
