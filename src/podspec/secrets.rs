//! # Session-scoped Secrets
//!
//! Pure builders for the two Secrets `SessionManager::create_session`
//! creates on demand: the initial-message Secret and the github-token
//! Secret (spec.md §4.4, steps 4-5). Callers encrypt the plaintext via the
//! `EncryptionRegistry` first; these functions only shape the result into a
//! Kubernetes object.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::encryption::EncryptedData;
use crate::podspec::labels;
use crate::session::Session;

fn encrypted_data_secret(name: &str, namespace: &str, session: &Session, key: &str, data: &EncryptedData) -> Secret {
    let mut string_data = BTreeMap::new();
    string_data.insert(
        key.to_string(),
        serde_json::to_string(data).unwrap_or_default(),
    );

    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels::for_session(session)),
            annotations: Some(labels::annotations_for_session(session)),
            ..Default::default()
        },
        string_data: Some(string_data),
        ..Default::default()
    }
}

#[must_use]
pub fn initial_message_secret(session: &Session, encrypted: &EncryptedData) -> Secret {
    encrypted_data_secret(
        &session.names.initial_message_secret,
        &session.namespace,
        session,
        "message",
        encrypted,
    )
}

#[must_use]
pub fn github_token_secret(session: &Session, encrypted: &EncryptedData) -> Secret {
    encrypted_data_secret(
        &session.names.github_token_secret,
        &session.namespace,
        session,
        "GITHUB_TOKEN",
        encrypted,
    )
}
