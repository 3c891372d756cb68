//! # EncryptionFactory
//!
//! Configuration-driven factory with graceful degradation, per spec.md
//! §4.2:
//!
//! 1. If a KMS key id + region are set, attempt KMS; on failure proceed.
//! 2. If a local key env/file is set and valid, return Local.
//! 3. Otherwise, return Passthrough.
//!
//! An invalid local key falls back to passthrough; the factory never
//! fails the process (spec.md §8 P8, §9 Open Questions — the tolerant
//! behavior is intentional, not a bug, because the "FallbackToLocal"
//! acceptance scenario requires it).

use std::sync::Arc;

use tracing::{info, warn};

use super::{CloudKms, EncryptionService, LocalAes256Gcm, Passthrough};

/// Environment-sourced parameters controlling backend selection.
#[derive(Debug, Clone, Default)]
pub struct EncryptionFactoryConfig {
    pub kms_key_id: Option<String>,
    pub kms_region: Option<String>,
    pub local_key_file: Option<String>,
    pub local_key_env: Option<String>,
}

impl EncryptionFactoryConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            kms_key_id: std::env::var("AGENTAPI_ENCRYPTION_KMS_KEY_ID").ok(),
            kms_region: std::env::var("AGENTAPI_ENCRYPTION_KMS_REGION").ok(),
            local_key_file: std::env::var("AGENTAPI_ENCRYPTION_KEY_FILE").ok(),
            local_key_env: std::env::var("AGENTAPI_ENCRYPTION_KEY").ok(),
        }
    }
}

pub struct EncryptionFactory;

impl EncryptionFactory {
    /// Construct the primary encryption service for this process,
    /// following the precedence above. Never errors.
    pub async fn create(config: &EncryptionFactoryConfig) -> Arc<dyn EncryptionService> {
        if let (Some(key_id), Some(region)) = (&config.kms_key_id, &config.kms_region) {
            if !key_id.is_empty() && !region.is_empty() {
                info!(key_id = %key_id, region = %region, "attempting KMS encryption backend");
                let kms = CloudKms::from_region(key_id.clone(), region.clone()).await;
                return Arc::new(kms);
            }
        }

        if let Some(local) = Self::try_local(config) {
            return local;
        }

        warn!("no encryption backend configured, falling back to passthrough");
        Arc::new(Passthrough::new())
    }

    fn try_local(config: &EncryptionFactoryConfig) -> Option<Arc<dyn EncryptionService>> {
        if let Some(path) = &config.local_key_file {
            match LocalAes256Gcm::from_file(path) {
                Ok(svc) => {
                    info!(path = %path, "loaded local AES-256-GCM key from file");
                    return Some(Arc::new(svc));
                }
                Err(e) => warn!(error = %e, path = %path, "local key file invalid, trying next source"),
            }
        }
        if let Some(value) = &config.local_key_env {
            match LocalAes256Gcm::from_base64_env_value(value) {
                Ok(svc) => {
                    info!("loaded local AES-256-GCM key from environment");
                    return Some(Arc::new(svc));
                }
                Err(e) => warn!(error = %e, "local key env value invalid, falling back to passthrough"),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    #[tokio::test]
    async fn fallback_to_passthrough_when_unconfigured() {
        // P8: no KMS, no local key -> passthrough, never error.
        let config = EncryptionFactoryConfig::default();
        let svc = EncryptionFactory::create(&config).await;
        assert_eq!(svc.algorithm(), "noop");
    }

    #[tokio::test]
    async fn fallback_to_passthrough_on_invalid_local_key() {
        let config = EncryptionFactoryConfig {
            local_key_env: Some("not-valid-base64-key!!".into()),
            ..Default::default()
        };
        let svc = EncryptionFactory::create(&config).await;
        assert_eq!(svc.algorithm(), "noop");
    }

    #[tokio::test]
    async fn local_key_env_produces_aes_backend() {
        let key = vec![7u8; 32];
        let config = EncryptionFactoryConfig {
            local_key_env: Some(BASE64.encode(key)),
            ..Default::default()
        };
        let svc = EncryptionFactory::create(&config).await;
        assert_eq!(svc.algorithm(), "aes-256-gcm");
    }
}
