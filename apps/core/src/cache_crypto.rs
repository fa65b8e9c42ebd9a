//! AES-256-GCM sealing for cached vault data.
//!
//! Sealed payloads are `MAGIC || nonce (12 bytes) || ciphertext + tag`. The
//! key is random, created on first use and kept in the keychain; losing it
//! only costs a re-sync.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

use crate::session::{TokenError, TokenStore};

pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const MAGIC: &[u8; 4] = b"BWA1";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("keychain error: {0}")]
    Keychain(#[from] TokenError),
    #[error("sealed payload is malformed")]
    Malformed,
    #[error("sealed payload failed authentication")]
    Auth,
    #[error("encryption failed")]
    Seal,
}

pub struct CacheCipher {
    cipher: Aes256Gcm,
}

impl CacheCipher {
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// A cipher under a fresh throwaway key.
    pub fn generate() -> Self {
        Self::new(&generate_key())
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::Seal)?;

        let mut sealed = Vec::with_capacity(MAGIC.len() + NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(MAGIC);
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let body = sealed.strip_prefix(MAGIC).ok_or(CryptoError::Malformed)?;
        if body.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Malformed);
        }
        let (nonce, ciphertext) = body.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Auth)
    }
}

pub fn generate_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}

/// Reads the base64 cache key from `keys`, replacing a missing or unreadable
/// one with a new random key.
pub fn load_or_create_key(keys: &dyn TokenStore) -> Result<[u8; KEY_LEN], CryptoError> {
    if let Some(encoded) = keys.get()? {
        let decoded = STANDARD
            .decode(encoded.trim())
            .ok()
            .and_then(|bytes| <[u8; KEY_LEN]>::try_from(bytes.as_slice()).ok());
        match decoded {
            Some(key) => return Ok(key),
            None => crate::logging::warn("stored cache key is malformed, replacing it"),
        }
    }

    let key = generate_key();
    keys.set(&STANDARD.encode(key))?;
    Ok(key)
}
