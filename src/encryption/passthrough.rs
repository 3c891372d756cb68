//! # Passthrough ("noop") encryption backend.
//!
//! Identity transform on both directions; metadata is still stamped so the
//! registry's `(algorithm, key_id)` lookup keeps working uniformly across
//! backends. Used as the factory's final, infallible fallback.

use async_trait::async_trait;

use super::{EncryptedData, EncryptionService};
use crate::error::EncryptionError;

#[derive(Debug, Clone, Default)]
pub struct Passthrough;

impl Passthrough {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EncryptionService for Passthrough {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedData, EncryptionError> {
        let encoded = String::from_utf8_lossy(plaintext).into_owned();
        Ok(EncryptedData::new(encoded, self.algorithm(), self.key_id()))
    }

    async fn decrypt(&self, data: &EncryptedData) -> Result<Vec<u8>, EncryptionError> {
        Ok(data.encrypted_value.clone().into_bytes())
    }

    fn algorithm(&self) -> &str {
        "noop"
    }

    fn key_id(&self) -> &str {
        "noop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_round_trip() {
        // Scenario 1 from spec.md §8.
        let svc = Passthrough::new();
        let data = svc.encrypt(b"hello").await.unwrap();
        assert_eq!(data.encrypted_value, "hello");
        assert_eq!(data.metadata.algorithm, "noop");
        assert_eq!(data.metadata.key_id, "noop");
        let plain = svc.decrypt(&data).await.unwrap();
        assert_eq!(plain, b"hello");
    }
}
