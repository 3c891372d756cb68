//! # MarketplaceSyncer
//!
//! Reconciles a single Secret carrying a named settings object's
//! marketplace configuration (spec.md §4.5). Grounded on the teacher's
//! `provider::common::{compare_secret_value, log_secret_operation}` pair
//! (`src/provider/common.rs`), generalized from "provider secret store" to
//! "in-cluster Secret", with the ownership gate spec.md adds on top.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value;

use crate::cluster::ClusterApi;
use crate::constants::{
    LABEL_APP_MANAGED_BY, MANAGED_BY_SETTINGS_VALUE, MARKETPLACE_DATA_KEY, MARKETPLACE_SECRET_PREFIX,
};
use crate::error::ClusterError;
use crate::naming::sanitize_secret_name;

/// Input to `MarketplaceSyncer::sync` (spec.md §4.5).
#[derive(Debug, Clone)]
pub struct Settings {
    pub name: String,
    pub marketplaces: BTreeMap<String, Value>,
}

#[must_use]
fn secret_name(settings_name: &str) -> String {
    format!(
        "{MARKETPLACE_SECRET_PREFIX}{}",
        sanitize_secret_name(settings_name, MARKETPLACE_SECRET_PREFIX.len())
    )
}

fn is_managed_by_settings(secret: &Secret) -> bool {
    secret
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(LABEL_APP_MANAGED_BY))
        .map(String::as_str)
        == Some(MANAGED_BY_SETTINGS_VALUE)
}

fn marketplace_secret(name: &str, namespace: &str, payload: &str) -> Secret {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_APP_MANAGED_BY.to_string(), MANAGED_BY_SETTINGS_VALUE.to_string());

    let mut string_data = BTreeMap::new();
    string_data.insert(MARKETPLACE_DATA_KEY.to_string(), payload.to_string());

    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        string_data: Some(string_data),
        ..Default::default()
    }
}

/// Reconciles the marketplace Secret for one settings object.
pub struct MarketplaceSyncer<C: ClusterApi> {
    cluster: Arc<C>,
    namespace: String,
}

impl<C: ClusterApi> MarketplaceSyncer<C> {
    #[must_use]
    pub fn new(cluster: Arc<C>, namespace: String) -> Self {
        Self { cluster, namespace }
    }

    /// `Sync(settings)` as specified: delete if empty, create-if-absent or
    /// update-if-present-and-owned otherwise, skip foreign objects with a
    /// warning (spec.md §4.5).
    #[tracing::instrument(skip(self, settings), fields(settings = %settings.name))]
    pub async fn sync(&self, settings: &Settings) -> Result<(), ClusterError> {
        let name = secret_name(&settings.name);
        let existing = self.cluster.get_secret(&self.namespace, &name).await?;

        if settings.marketplaces.is_empty() {
            return self.delete_if_owned(&name, existing).await;
        }

        let payload = serde_json::to_string_pretty(&settings.marketplaces)
            .expect("marketplace map always serializes to JSON");

        match existing {
            None => {
                tracing::info!(secret = %name, "creating marketplace secret");
                self.cluster
                    .create_secret(&self.namespace, marketplace_secret(&name, &self.namespace, &payload))
                    .await
            }
            Some(current) if is_managed_by_settings(&current) => {
                tracing::info!(secret = %name, "updating marketplace secret");
                self.cluster
                    .update_secret(&self.namespace, marketplace_secret(&name, &self.namespace, &payload))
                    .await
            }
            Some(_) => {
                tracing::warn!(secret = %name, "marketplace secret exists but is not managed by settings, leaving untouched");
                Ok(())
            }
        }
    }

    async fn delete_if_owned(&self, name: &str, existing: Option<Secret>) -> Result<(), ClusterError> {
        match existing {
            None => Ok(()),
            Some(secret) if is_managed_by_settings(&secret) => {
                tracing::info!(secret = %name, "deleting marketplace secret, settings carries no marketplaces");
                match self.cluster.delete_secret(&self.namespace, name).await {
                    Ok(()) | Err(ClusterError::NotFound { .. }) => Ok(()),
                    Err(error) => Err(error),
                }
            }
            Some(_) => {
                tracing::warn!(secret = %name, "marketplace secret exists but is not managed by settings, leaving untouched on delete");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::fake::FakeClusterApi;
    use serde_json::json;

    fn settings_with(name: &str, marketplaces: &[(&str, Value)]) -> Settings {
        Settings {
            name: name.to_string(),
            marketplaces: marketplaces.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        }
    }

    #[tokio::test]
    async fn creates_secret_when_absent() {
        let cluster = Arc::new(FakeClusterApi::new());
        let syncer = MarketplaceSyncer::new(Arc::clone(&cluster), "default".to_string());
        let settings = settings_with("team-a", &[("npm", json!({"url": "https://example.com"}))]);

        syncer.sync(&settings).await.unwrap();

        let secret = cluster.get_secret("default", &secret_name("team-a")).await.unwrap();
        assert!(secret.is_some());
        assert!(is_managed_by_settings(&secret.unwrap()));
    }

    #[tokio::test]
    async fn updates_secret_when_owned() {
        let cluster = Arc::new(FakeClusterApi::new());
        let syncer = MarketplaceSyncer::new(Arc::clone(&cluster), "default".to_string());
        let first = settings_with("team-a", &[("npm", json!({"url": "https://example.com"}))]);
        syncer.sync(&first).await.unwrap();

        let second = settings_with("team-a", &[("npm", json!({"url": "https://updated.example.com"}))]);
        syncer.sync(&second).await.unwrap();

        let secret = cluster
            .get_secret("default", &secret_name("team-a"))
            .await
            .unwrap()
            .unwrap();
        let payload = secret.string_data.unwrap();
        assert!(payload.get(MARKETPLACE_DATA_KEY).unwrap().contains("updated.example.com"));
    }

    #[tokio::test]
    async fn leaves_foreign_secret_untouched() {
        let cluster = Arc::new(FakeClusterApi::new());
        let name = secret_name("team-a");
        cluster
            .create_secret(
                "default",
                Secret {
                    metadata: ObjectMeta {
                        name: Some(name.clone()),
                        namespace: Some("default".to_string()),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let syncer = MarketplaceSyncer::new(Arc::clone(&cluster), "default".to_string());
        let settings = settings_with("team-a", &[("npm", json!({"url": "https://example.com"}))]);
        syncer.sync(&settings).await.unwrap();

        let secret = cluster.get_secret("default", &name).await.unwrap().unwrap();
        assert!(secret.string_data.is_none());
    }

    #[tokio::test]
    async fn deletes_owned_secret_when_marketplaces_empty() {
        let cluster = Arc::new(FakeClusterApi::new());
        let syncer = MarketplaceSyncer::new(Arc::clone(&cluster), "default".to_string());
        let populated = settings_with("team-a", &[("npm", json!({"url": "https://example.com"}))]);
        syncer.sync(&populated).await.unwrap();

        let empty = settings_with("team-a", &[]);
        syncer.sync(&empty).await.unwrap();

        assert!(cluster.get_secret("default", &secret_name("team-a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_absent_secret_is_a_no_op() {
        let cluster = Arc::new(FakeClusterApi::new());
        let syncer = MarketplaceSyncer::new(Arc::clone(&cluster), "default".to_string());
        let empty = settings_with("team-a", &[]);
        syncer.sync(&empty).await.unwrap();
    }
}
