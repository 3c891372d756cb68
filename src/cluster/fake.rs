//! # FakeClusterApi
//!
//! In-memory `ClusterApi` used by unit and integration tests (SPEC_FULL.md
//! §9). Lets tests drive `ReadyReplicas`/`Replicas` directly to exercise the
//! watcher's phase transitions without a live cluster.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use super::ClusterApi;
use crate::error::ClusterError;

type Key = (String, String);

#[derive(Default)]
pub struct FakeClusterApi {
    secrets: Mutex<HashMap<Key, Secret>>,
    pvcs: Mutex<HashMap<Key, PersistentVolumeClaim>>,
    deployments: Mutex<HashMap<Key, Deployment>>,
    services: Mutex<HashMap<Key, Service>>,
}

fn meta_name(meta: &ObjectMeta) -> String {
    meta.name.clone().unwrap_or_default()
}

fn matches_selector(labels: &std::collections::BTreeMap<String, String>, selector: &str) -> bool {
    if selector.is_empty() {
        return true;
    }
    selector.split(',').all(|clause| {
        let clause = clause.trim();
        match clause.split_once('=') {
            Some((k, v)) => labels.get(k).map(String::as_str) == Some(v),
            None => false,
        }
    })
}

impl FakeClusterApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: set a deployment's reported replica counts, to drive the
    /// watcher's fast/slow poll transitions deterministically.
    pub fn set_deployment_status(
        &self,
        namespace: &str,
        name: &str,
        ready_replicas: i32,
        replicas: i32,
    ) {
        let mut deployments = self.deployments.lock().expect("lock poisoned");
        if let Some(dep) = deployments.get_mut(&(namespace.to_string(), name.to_string())) {
            dep.status = Some(DeploymentStatus {
                ready_replicas: Some(ready_replicas),
                replicas: Some(replicas),
                ..Default::default()
            });
        }
    }
}

#[async_trait]
impl ClusterApi for FakeClusterApi {
    async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<(), ClusterError> {
        let name = meta_name(&secret.metadata);
        let mut secrets = self.secrets.lock().expect("lock poisoned");
        let key = (namespace.to_string(), name.clone());
        if secrets.contains_key(&key) {
            return Err(ClusterError::AlreadyExists {
                resource: "Secret",
                namespace: namespace.to_string(),
                name,
            });
        }
        secrets.insert(key, secret);
        Ok(())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ClusterError> {
        let secrets = self.secrets.lock().expect("lock poisoned");
        Ok(secrets.get(&(namespace.to_string(), name.to_string())).cloned())
    }

    async fn update_secret(&self, namespace: &str, secret: Secret) -> Result<(), ClusterError> {
        let name = meta_name(&secret.metadata);
        let mut secrets = self.secrets.lock().expect("lock poisoned");
        let key = (namespace.to_string(), name.clone());
        if !secrets.contains_key(&key) {
            return Err(ClusterError::NotFound {
                resource: "Secret",
                namespace: namespace.to_string(),
                name,
            });
        }
        secrets.insert(key, secret);
        Ok(())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let mut secrets = self.secrets.lock().expect("lock poisoned");
        match secrets.remove(&(namespace.to_string(), name.to_string())) {
            Some(_) => Ok(()),
            None => Err(ClusterError::NotFound {
                resource: "Secret",
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
        }
    }

    async fn create_pvc(
        &self,
        namespace: &str,
        pvc: PersistentVolumeClaim,
    ) -> Result<(), ClusterError> {
        let name = meta_name(&pvc.metadata);
        let mut pvcs = self.pvcs.lock().expect("lock poisoned");
        let key = (namespace.to_string(), name.clone());
        if pvcs.contains_key(&key) {
            return Err(ClusterError::AlreadyExists {
                resource: "PersistentVolumeClaim",
                namespace: namespace.to_string(),
                name,
            });
        }
        pvcs.insert(key, pvc);
        Ok(())
    }

    async fn delete_pvc(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let mut pvcs = self.pvcs.lock().expect("lock poisoned");
        match pvcs.remove(&(namespace.to_string(), name.to_string())) {
            Some(_) => Ok(()),
            None => Err(ClusterError::NotFound {
                resource: "PersistentVolumeClaim",
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
        }
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: Deployment,
    ) -> Result<(), ClusterError> {
        let name = meta_name(&deployment.metadata);
        let mut deployments = self.deployments.lock().expect("lock poisoned");
        let key = (namespace.to_string(), name.clone());
        if deployments.contains_key(&key) {
            return Err(ClusterError::AlreadyExists {
                resource: "Deployment",
                namespace: namespace.to_string(),
                name,
            });
        }
        deployments.insert(key, deployment);
        Ok(())
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, ClusterError> {
        let deployments = self.deployments.lock().expect("lock poisoned");
        Ok(deployments
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let mut deployments = self.deployments.lock().expect("lock poisoned");
        match deployments.remove(&(namespace.to_string(), name.to_string())) {
            Some(_) => Ok(()),
            None => Err(ClusterError::NotFound {
                resource: "Deployment",
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
        }
    }

    async fn list_deployments(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Deployment>, ClusterError> {
        let deployments = self.deployments.lock().expect("lock poisoned");
        Ok(deployments
            .iter()
            .filter(|((ns, _), dep)| {
                ns == namespace && matches_selector(&dep.metadata.labels.clone().unwrap_or_default(), label_selector)
            })
            .map(|(_, dep)| dep.clone())
            .collect())
    }

    async fn create_service(&self, namespace: &str, service: Service) -> Result<(), ClusterError> {
        let name = meta_name(&service.metadata);
        let mut services = self.services.lock().expect("lock poisoned");
        let key = (namespace.to_string(), name.clone());
        if services.contains_key(&key) {
            return Err(ClusterError::AlreadyExists {
                resource: "Service",
                namespace: namespace.to_string(),
                name,
            });
        }
        services.insert(key, service);
        Ok(())
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, ClusterError> {
        let services = self.services.lock().expect("lock poisoned");
        Ok(services.get(&(namespace.to_string(), name.to_string())).cloned())
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let mut services = self.services.lock().expect("lock poisoned");
        match services.remove(&(namespace.to_string(), name.to_string())) {
            Some(_) => Ok(()),
            None => Err(ClusterError::NotFound {
                resource: "Service",
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
        }
    }

    async fn list_services(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Service>, ClusterError> {
        let services = self.services.lock().expect("lock poisoned");
        Ok(services
            .iter()
            .filter(|((ns, _), svc)| {
                ns == namespace && matches_selector(&svc.metadata.labels.clone().unwrap_or_default(), label_selector)
            })
            .map(|(_, svc)| svc.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn deployment(name: &str, labels: &[(&str, &str)]) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let api = FakeClusterApi::new();
        api.create_deployment("ns", deployment("dep-1", &[])).await.unwrap();
        let got = api.get_deployment("ns", "dep-1").await.unwrap();
        assert!(got.is_some());
    }

    #[tokio::test]
    async fn create_twice_is_already_exists() {
        let api = FakeClusterApi::new();
        api.create_deployment("ns", deployment("dep-1", &[])).await.unwrap();
        let err = api.create_deployment("ns", deployment("dep-1", &[])).await.unwrap_err();
        assert!(matches!(err, ClusterError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let api = FakeClusterApi::new();
        let err = api.delete_deployment("ns", "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_filters_by_label_selector() {
        let api = FakeClusterApi::new();
        api.create_deployment("ns", deployment("a", &[("agentapi.io/session-id", "s1")]))
            .await
            .unwrap();
        api.create_deployment("ns", deployment("b", &[("agentapi.io/session-id", "s2")]))
            .await
            .unwrap();

        let found = api
            .list_deployments("ns", "agentapi.io/session-id=s1")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metadata.name.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn set_deployment_status_drives_watcher_test_hooks() {
        let api = FakeClusterApi::new();
        api.create_deployment("ns", deployment("dep-1", &[])).await.unwrap();
        api.set_deployment_status("ns", "dep-1", 1, 1);
        let dep = api.get_deployment("ns", "dep-1").await.unwrap().unwrap();
        assert_eq!(dep.status.unwrap().ready_replicas, Some(1));
    }

    #[tokio::test]
    async fn ensure_secret_treats_already_exists_as_success() {
        let api = FakeClusterApi::new();
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some("sec-1".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        api.create_secret("ns", secret.clone()).await.unwrap();
        api.ensure_secret("ns", secret).await.unwrap();
    }

    #[tokio::test]
    async fn update_secret_requires_existing_object() {
        let api = FakeClusterApi::new();
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some("sec-1".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = api.update_secret("ns", secret.clone()).await.unwrap_err();
        assert!(err.is_not_found());

        api.create_secret("ns", secret.clone()).await.unwrap();
        api.update_secret("ns", secret).await.unwrap();
    }
}
