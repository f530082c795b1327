use anyhow::{Context, Result};

/// Process configuration, loaded once from the environment at boot,
/// pulled from `std::env` rather than CLI args.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub db_path: std::path::PathBuf,
    pub jwt_secret: String,
    /// 32 raw bytes decoded from the hex `ENCRYPTION_KEY` env var.
    pub encryption_key: [u8; 32],
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(7400);

        let db_path = std::env::var("DB_PATH")
            .unwrap_or_else(|_| "./crowny-exchange.db".to_string())
            .into();

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set — using an ephemeral development secret");
            "dev-only-insecure-secret-do-not-use-in-production".to_string()
        });

        let encryption_key = match std::env::var("ENCRYPTION_KEY") {
            Ok(hex_str) => {
                let bytes = hex::decode(hex_str.trim()).context("ENCRYPTION_KEY is not valid hex")?;
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| anyhow::anyhow!("ENCRYPTION_KEY must decode to exactly 32 bytes"))?;
                arr
            }
            Err(_) => {
                tracing::warn!(
                    "ENCRYPTION_KEY not set — using an ephemeral development key, vault contents will not survive restarts"
                );
                [0x42u8; 32]
            }
        };

        Ok(Self {
            port,
            db_path,
            jwt_secret,
            encryption_key,
        })
    }
}
