//! # EncryptionService & Registry
//!
//! A polymorphic credential-protection layer, grounded on the teacher's
//! `SecretManagerProvider` trait-per-backend pattern
//! (`src/provider/mod.rs`) and generalized from "pick a cloud secret
//! store" to "pick an encryption backend".
//!
//! See spec.md §4.2 and the testable properties P1/P2/P8/P9 in spec.md §8.

pub mod factory;
pub mod kms;
pub mod local_aes;
pub mod passthrough;
pub mod registry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EncryptionError;

pub use factory::EncryptionFactory;
pub use kms::CloudKms;
pub use local_aes::LocalAes256Gcm;
pub use passthrough::Passthrough;
pub use registry::EncryptionRegistry;

/// Metadata stamped on every encrypted payload; `(algorithm, key_id)` is
/// the decryption lookup key (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EncryptionMetadata {
    pub algorithm: String,
    pub key_id: String,
    pub encrypted_at: DateTime<Utc>,
    pub version: String,
}

/// Wire format: `{ "encrypted_value": ..., "metadata": { ... } }`
/// (spec.md §6, "EncryptedData wire format").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    pub encrypted_value: String,
    pub metadata: EncryptionMetadata,
}

impl EncryptedData {
    #[must_use]
    pub fn new(encrypted_value: String, algorithm: &str, key_id: &str) -> Self {
        Self {
            encrypted_value,
            metadata: EncryptionMetadata {
                algorithm: algorithm.to_string(),
                key_id: key_id.to_string(),
                encrypted_at: Utc::now(),
                version: "v1".to_string(),
            },
        }
    }
}

/// Capability interface implemented by each encryption backend.
#[async_trait]
pub trait EncryptionService: Send + Sync {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedData, EncryptionError>;
    async fn decrypt(&self, data: &EncryptedData) -> Result<Vec<u8>, EncryptionError>;
    fn algorithm(&self) -> &str;
    fn key_id(&self) -> &str;
}
