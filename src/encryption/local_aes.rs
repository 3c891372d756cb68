//! # Local AES-256-GCM encryption backend.
//!
//! Loads a 32-byte key from (in priority order) an explicit file path or a
//! base64-encoded environment variable payload; any other length is
//! rejected. Nonce is 12 fresh random bytes, prepended to the ciphertext
//! before base64-encoding. `key_id = "sha256:" + first 8 bytes hex of the
//! key`, so rotating a key changes the registry lookup key without
//! invalidating previously-encrypted data (the registry keeps the old
//! service registered under its own key_id).
//!
//! Grounded on the `aes-gcm` crate as used by the `backend` feature of the
//! `NiklasRosenstein-rise` sibling example in this corpus; the teacher
//! itself has no local-AES backend, only cloud secret stores.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use zeroize::Zeroizing;

use super::{EncryptedData, EncryptionService};
use crate::error::EncryptionError;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

pub struct LocalAes256Gcm {
    cipher: Aes256Gcm,
    key_id: String,
}

impl LocalAes256Gcm {
    /// Build from raw 32-byte key material. Any other length is rejected
    /// with a message containing "must be 32 bytes" (spec.md §8 scenario 3).
    pub fn from_key_bytes(key: &[u8]) -> Result<Self, EncryptionError> {
        if key.len() != KEY_LEN {
            return Err(EncryptionError::InvalidKeyLength(key.len()));
        }
        let key_id = format!("sha256:{}", hex_prefix(key, 8));
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        Ok(Self { cipher, key_id })
    }

    /// Load from a file containing either raw 32 bytes or a base64 payload.
    pub fn from_file(path: &str) -> Result<Self, EncryptionError> {
        let contents = std::fs::read(path)
            .map_err(|e| EncryptionError::KeyLoad(format!("reading {path}: {e}")))?;
        let key = decode_key_material(&contents)?;
        Self::from_key_bytes(&key)
    }

    /// Load from a base64-encoded environment variable payload.
    pub fn from_base64_env_value(value: &str) -> Result<Self, EncryptionError> {
        let key = Zeroizing::new(
            BASE64
                .decode(value.trim())
                .map_err(|e| EncryptionError::KeyLoad(format!("invalid base64 key: {e}")))?,
        );
        Self::from_key_bytes(&key)
    }
}

fn decode_key_material(contents: &[u8]) -> Result<Zeroizing<Vec<u8>>, EncryptionError> {
    if contents.len() == KEY_LEN {
        return Ok(Zeroizing::new(contents.to_vec()));
    }
    let text = String::from_utf8_lossy(contents);
    let decoded = BASE64
        .decode(text.trim())
        .map_err(|e| EncryptionError::KeyLoad(format!("invalid base64 key: {e}")))?;
    Ok(Zeroizing::new(decoded))
}

fn hex_prefix(bytes: &[u8], n: usize) -> String {
    bytes.iter().take(n).map(|b| format!("{b:02x}")).collect()
}

#[async_trait::async_trait]
impl EncryptionService for LocalAes256Gcm {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedData, EncryptionError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| EncryptionError::EncryptionFailed(e.to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(EncryptedData::new(
            BASE64.encode(combined),
            self.algorithm(),
            self.key_id(),
        ))
    }

    async fn decrypt(&self, data: &EncryptedData) -> Result<Vec<u8>, EncryptionError> {
        let combined = BASE64
            .decode(&data.encrypted_value)
            .map_err(|e| EncryptionError::DecryptionFailed(format!("invalid base64: {e}")))?;
        if combined.len() < NONCE_LEN {
            return Err(EncryptionError::DecryptionFailed("ciphertext too short".into()));
        }
        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| EncryptionError::DecryptionFailed("authentication failed".into()))
    }

    fn algorithm(&self) -> &str {
        "aes-256-gcm"
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }
}
