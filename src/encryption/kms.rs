//! # Cloud KMS encryption backend.
//!
//! Forwards `Encrypt`/`Decrypt` to a remote KMS key. `key_id` is the
//! externally-supplied key ARN; `algorithm` is always `"aws-kms"`.
//!
//! Grounded on `aws-sdk-kms`, reusing the teacher's AWS SDK family
//! (`aws-config`, `aws-sdk-sts` et al. in `Cargo.toml`) rather than
//! inventing a new cloud dependency.

use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::Client as KmsClient;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use super::{EncryptedData, EncryptionService};
use crate::error::EncryptionError;

pub struct CloudKms {
    client: KmsClient,
    key_arn: String,
}

impl CloudKms {
    #[must_use]
    pub fn new(client: KmsClient, key_arn: String) -> Self {
        Self { client, key_arn }
    }

    /// Build a KMS client from the ambient AWS configuration for `region`.
    pub async fn from_region(key_arn: String, region: String) -> Self {
        let config = aws_config::from_env()
            .region(aws_config::Region::new(region))
            .load()
            .await;
        Self::new(KmsClient::new(&config), key_arn)
    }
}

#[async_trait::async_trait]
impl EncryptionService for CloudKms {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedData, EncryptionError> {
        let output = self
            .client
            .encrypt()
            .key_id(&self.key_arn)
            .plaintext(Blob::new(plaintext.to_vec()))
            .send()
            .await
            .map_err(|e| EncryptionError::Kms(e.to_string()))?;

        let ciphertext = output
            .ciphertext_blob()
            .ok_or_else(|| EncryptionError::Kms("KMS returned no ciphertext".into()))?;

        Ok(EncryptedData::new(
            BASE64.encode(ciphertext.as_ref()),
            self.algorithm(),
            self.key_id(),
        ))
    }

    async fn decrypt(&self, data: &EncryptedData) -> Result<Vec<u8>, EncryptionError> {
        let ciphertext = BASE64
            .decode(&data.encrypted_value)
            .map_err(|e| EncryptionError::DecryptionFailed(format!("invalid base64: {e}")))?;

        let output = self
            .client
            .decrypt()
            .key_id(&self.key_arn)
            .ciphertext_blob(Blob::new(ciphertext))
            .send()
            .await
            .map_err(|e| EncryptionError::Kms(e.to_string()))?;

        let plaintext = output
            .plaintext()
            .ok_or_else(|| EncryptionError::Kms("KMS returned no plaintext".into()))?;

        Ok(plaintext.as_ref().to_vec())
    }

    fn algorithm(&self) -> &str {
        "aws-kms"
    }

    fn key_id(&self) -> &str {
        &self.key_arn
    }
}
