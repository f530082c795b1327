//! Password hashing and session JWTs for the transport edge. The teacher's
//! PBKDF2+AES-GCM private-key encryption helpers are dropped here — venue
//! API keys go through `vault::KeyVault`'s scrypt+AES-GCM instead (spec
//! §4.8).

use anyhow::{Context, Result};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const JWT_EXPIRY_DAYS: i64 = 7;

pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, 12).context("hashing password")
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Returns the signed token and its expiry as a unix timestamp.
pub fn create_jwt(principal_id: &str, secret: &str) -> Result<(String, i64)> {
    let expires_at = (chrono::Utc::now() + chrono::Duration::days(JWT_EXPIRY_DAYS)).timestamp();
    let claims = Claims {
        sub: principal_id.to_string(),
        exp: expires_at as usize,
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).context("creating jwt")?;
    Ok((token, expires_at))
}

pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims> {
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .context("invalid token")?;
    Ok(data.claims)
}
