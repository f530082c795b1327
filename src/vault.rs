//! API key vault (spec §4.7). Grounded on the teacher's `api/auth.rs`
//! AES-256-GCM encrypt/decrypt helpers (random 12-byte IV, ciphertext with
//! the GCM tag appended), with the key-derivation step swapped from the
//! teacher's PBKDF2-SHA256 to scrypt per the spec's explicit KDF naming.

use aes_gcm::aead::{generic_array::GenericArray, Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use scrypt::{scrypt, Params};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;
const SCRYPT_OUTPUT_LEN: usize = 32;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
/// Fixed application-level salt for the process-wide vault key. The
/// passphrase material itself (`Config::encryption_key`) is operator-
/// supplied and unique per deployment, so a fixed salt here does not
/// reduce the derivation to a lookup table.
const VAULT_SALT: &[u8] = b"crowny-exchange/key-vault/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedSecret {
    pub cipher_hex: String,
    pub iv_hex: String,
    pub tag_hex: String,
}

/// Holds the scrypt-derived AES-256-GCM key for the lifetime of the
/// process. Constructed once at boot from `Config::encryption_key`.
pub struct KeyVault {
    cipher: Aes256Gcm,
}

impl KeyVault {
    pub fn new(passphrase: &[u8]) -> AppResult<Self> {
        let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, SCRYPT_OUTPUT_LEN)
            .map_err(|_| AppError::Cryptographic)?;
        let mut key = [0u8; SCRYPT_OUTPUT_LEN];
        scrypt(passphrase, VAULT_SALT, &params, &mut key).map_err(|_| AppError::Cryptographic)?;
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&key));
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> AppResult<EncryptedSecret> {
        use rand::Rng;
        let iv: [u8; IV_LEN] = rand::rng().random();
        let nonce = Nonce::from_slice(&iv);

        let sealed = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| AppError::Cryptographic)?;
        let (cipher_bytes, tag_bytes) = sealed.split_at(sealed.len() - TAG_LEN);

        Ok(EncryptedSecret {
            cipher_hex: hex::encode(cipher_bytes),
            iv_hex: hex::encode(iv),
            tag_hex: hex::encode(tag_bytes),
        })
    }

    /// Decrypt a previously-sealed secret. Any failure — malformed hex, bad
    /// tag, wrong key — collapses to `NotFound`, matching the spec's rule
    /// that a vault lookup never leaks cryptographic detail to the caller.
    pub fn decrypt(&self, secret: &EncryptedSecret) -> AppResult<String> {
        let not_found = || AppError::NotFound("key".to_string());

        let iv = hex::decode(&secret.iv_hex).map_err(|_| not_found())?;
        let cipher_bytes = hex::decode(&secret.cipher_hex).map_err(|_| not_found())?;
        let tag_bytes = hex::decode(&secret.tag_hex).map_err(|_| not_found())?;
        if iv.len() != IV_LEN {
            return Err(not_found());
        }

        let mut sealed = cipher_bytes;
        sealed.extend_from_slice(&tag_bytes);
        let nonce = Nonce::from_slice(&iv);

        let plaintext = self.cipher.decrypt(nonce, sealed.as_slice()).map_err(|_| not_found())?;
        String::from_utf8(plaintext).map_err(|_| not_found())
    }
}

/// First 8 and last 4 characters of an access key, for display (spec §4.7).
pub fn mask_access_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Last 4 characters of a secret key, for display (spec §4.7). The rest is
/// never reconstructible from the masked form.
pub fn mask_secret_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_secret() {
        let vault = KeyVault::new(b"test-passphrase-material").unwrap();
        let sealed = vault.encrypt("super-secret-api-key").unwrap();
        let opened = vault.decrypt(&sealed).unwrap();
        assert_eq!(opened, "super-secret-api-key");
    }

    #[test]
    fn wrong_key_fails_closed_as_not_found() {
        let vault_a = KeyVault::new(b"passphrase-a").unwrap();
        let vault_b = KeyVault::new(b"passphrase-b").unwrap();
        let sealed = vault_a.encrypt("top-secret").unwrap();
        let result = vault_b.decrypt(&sealed);
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn tampered_ciphertext_fails_closed() {
        let vault = KeyVault::new(b"test-passphrase-material").unwrap();
        let mut sealed = vault.encrypt("top-secret").unwrap();
        sealed.cipher_hex.replace_range(0..2, "ff");
        let result = vault.decrypt(&sealed);
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn masks_access_and_secret_keys() {
        assert_eq!(mask_access_key("ABCDEFGHIJKLMNOP"), "ABCDEFGH...MNOP");
        assert_eq!(mask_secret_key("ABCDEFGHIJKLMNOP"), "****MNOP");
        assert_eq!(mask_access_key("short"), "*****");
    }
}
