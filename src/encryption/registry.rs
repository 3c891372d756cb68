//! # EncryptionRegistry
//!
//! Keyed by `(algorithm, key_id)` primary, then `algorithm` fallback, then
//! the registered primary. Exists so that rotating the primary key does not
//! invalidate data written under a previous one: the fallback chain is
//! intentionally conservative (exact match → algorithm compatibility →
//! primary, for legacy passthrough data). See spec.md §4.2 and P9 in §8.

use std::collections::HashMap;
use std::sync::Arc;

use super::{EncryptedData, EncryptionService};
use crate::error::EncryptionError;

type ServiceRef = Arc<dyn EncryptionService>;

#[derive(Clone, Default)]
pub struct EncryptionRegistry {
    /// Keyed by `"{algorithm}:{key_id}"`.
    by_algorithm_and_key: HashMap<String, ServiceRef>,
    /// Keyed by `algorithm` alone; last-registered wins per algorithm.
    by_algorithm: HashMap<String, ServiceRef>,
    primary: Option<ServiceRef>,
}

fn composite_key(algorithm: &str, key_id: &str) -> String {
    format!("{algorithm}:{key_id}")
}

impl EncryptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service, indexing it under both its exact
    /// `(algorithm, key_id)` and its bare `algorithm`.
    pub fn register(&mut self, service: ServiceRef) {
        self.by_algorithm_and_key.insert(
            composite_key(service.algorithm(), service.key_id()),
            Arc::clone(&service),
        );
        self.by_algorithm
            .insert(service.algorithm().to_string(), Arc::clone(&service));
    }

    /// Register a service and make it the primary. Registering a new
    /// primary also registers it under the normal indices.
    pub fn set_primary(&mut self, service: ServiceRef) {
        self.register(Arc::clone(&service));
        self.primary = Some(service);
    }

    /// `GetForEncryption()` always returns the primary.
    pub fn get_for_encryption(&self) -> Result<ServiceRef, EncryptionError> {
        self.primary
            .clone()
            .ok_or(EncryptionError::NoServiceRegistered {
                algorithm: None,
                key_id: None,
            })
    }

    /// Three-step lookup for decryption: exact `(algorithm, key_id)` match,
    /// then `algorithm` alone, then the registered primary.
    pub fn get_for_decryption(
        &self,
        metadata: &super::EncryptionMetadata,
    ) -> Result<ServiceRef, EncryptionError> {
        if let Some(svc) = self
            .by_algorithm_and_key
            .get(&composite_key(&metadata.algorithm, &metadata.key_id))
        {
            return Ok(Arc::clone(svc));
        }
        if let Some(svc) = self.by_algorithm.get(&metadata.algorithm) {
            return Ok(Arc::clone(svc));
        }
        self.primary
            .clone()
            .ok_or_else(|| EncryptionError::NoServiceRegistered {
                algorithm: Some(metadata.algorithm.clone()),
                key_id: Some(metadata.key_id.clone()),
            })
    }

    /// Convenience: encrypt using the primary service.
    pub async fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedData, EncryptionError> {
        self.get_for_encryption()?.encrypt(plaintext).await
    }

    /// Convenience: decrypt by resolving the right service via the lookup
    /// chain above.
    pub async fn decrypt(&self, data: &EncryptedData) -> Result<Vec<u8>, EncryptionError> {
        self.get_for_decryption(&data.metadata)?.decrypt(data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::{LocalAes256Gcm, Passthrough};
    use rand::RngCore;

    fn random_key() -> Vec<u8> {
        let mut key = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        key
    }

    #[test]
    fn registry_lookup_exact_match() {
        // P9: Register(s); GetForDecryption({algorithm, keyID}) == s.
        let mut registry = EncryptionRegistry::new();
        let svc: ServiceRef = Arc::new(LocalAes256Gcm::from_key_bytes(&random_key()).unwrap());
        registry.register(Arc::clone(&svc));

        let metadata = super::super::EncryptionMetadata {
            algorithm: svc.algorithm().to_string(),
            key_id: svc.key_id().to_string(),
            encrypted_at: chrono::Utc::now(),
            version: "v1".into(),
        };
        let resolved = registry.get_for_decryption(&metadata).unwrap();
        assert_eq!(resolved.key_id(), svc.key_id());
    }

    #[test]
    fn registry_falls_back_to_algorithm() {
        let mut registry = EncryptionRegistry::new();
        let svc: ServiceRef = Arc::new(LocalAes256Gcm::from_key_bytes(&random_key()).unwrap());
        registry.register(Arc::clone(&svc));

        let metadata = super::super::EncryptionMetadata {
            algorithm: svc.algorithm().to_string(),
            key_id: "some-other-key-id".into(),
            encrypted_at: chrono::Utc::now(),
            version: "v1".into(),
        };
        let resolved = registry.get_for_decryption(&metadata).unwrap();
        assert_eq!(resolved.algorithm(), svc.algorithm());
    }

    #[test]
    fn registry_falls_back_to_primary_for_legacy_data() {
        let mut registry = EncryptionRegistry::new();
        let primary: ServiceRef = Arc::new(Passthrough::new());
        registry.set_primary(Arc::clone(&primary));

        let metadata = super::super::EncryptionMetadata {
            algorithm: "unknown-algorithm".into(),
            key_id: "unknown-key".into(),
            encrypted_at: chrono::Utc::now(),
            version: "v1".into(),
        };
        let resolved = registry.get_for_decryption(&metadata).unwrap();
        assert_eq!(resolved.algorithm(), "noop");
    }

    #[test]
    fn get_for_encryption_returns_primary() {
        let mut registry = EncryptionRegistry::new();
        let primary: ServiceRef = Arc::new(Passthrough::new());
        registry.set_primary(Arc::clone(&primary));
        let other: ServiceRef = Arc::new(LocalAes256Gcm::from_key_bytes(&random_key()).unwrap());
        registry.register(other);

        assert_eq!(registry.get_for_encryption().unwrap().algorithm(), "noop");
    }

    #[tokio::test]
    async fn registry_encrypt_decrypt_round_trip() {
        let mut registry = EncryptionRegistry::new();
        let primary: ServiceRef = Arc::new(LocalAes256Gcm::from_key_bytes(&random_key()).unwrap());
        registry.set_primary(primary);

        let data = registry.encrypt(b"round trip").await.unwrap();
        let plain = registry.decrypt(&data).await.unwrap();
        assert_eq!(plain, b"round trip");
    }
}
