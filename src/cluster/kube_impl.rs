//! # KubeClusterApi
//!
//! The production `ClusterApi` implementation, backed by a real
//! `kube::Client`. Grounded on the `Api::namespaced`/`PostParams`/
//! `DeleteParams`/404-matching idiom used throughout this corpus's
//! Kubernetes clients (e.g. `NiklasRosenstein-rise`'s deployment
//! controller and the substrate-playground session helper in
//! `other_examples/`).

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams, PropagationPolicy};
use kube::Client;

use super::ClusterApi;
use crate::error::ClusterError;

#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pvcs(&self, namespace: &str) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Foreground-delete params, per spec.md §4.4 `DeleteSession`.
fn foreground_delete_params() -> DeleteParams {
    DeleteParams {
        propagation_policy: Some(PropagationPolicy::Foreground),
        ..DeleteParams::default()
    }
}

fn map_create_err(e: kube::Error, resource: &'static str, namespace: &str, name: &str) -> ClusterError {
    match &e {
        kube::Error::Api(ae) if ae.code == 409 => ClusterError::AlreadyExists {
            resource,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        _ => ClusterError::Backend(e.to_string()),
    }
}

fn map_delete_err(e: kube::Error, resource: &'static str, namespace: &str, name: &str) -> ClusterError {
    match &e {
        kube::Error::Api(ae) if ae.code == 404 => ClusterError::NotFound {
            resource,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        _ => ClusterError::Backend(e.to_string()),
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<(), ClusterError> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        self.secrets(namespace)
            .create(&PostParams::default(), &secret)
            .await
            .map(|_| ())
            .map_err(|e| map_create_err(e, "Secret", namespace, &name))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ClusterError> {
        match self.secrets(namespace).get(name).await {
            Ok(secret) => Ok(Some(secret)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(ClusterError::Backend(e.to_string())),
        }
    }

    async fn update_secret(&self, namespace: &str, secret: Secret) -> Result<(), ClusterError> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        self.secrets(namespace)
            .patch(&name, &PatchParams::apply("agentapi-session-manager"), &Patch::Merge(&secret))
            .await
            .map(|_| ())
            .map_err(|e| ClusterError::Backend(e.to_string()))
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.secrets(namespace)
            .delete(name, &foreground_delete_params())
            .await
            .map(|_| ())
            .map_err(|e| map_delete_err(e, "Secret", namespace, name))
    }

    async fn create_pvc(
        &self,
        namespace: &str,
        pvc: PersistentVolumeClaim,
    ) -> Result<(), ClusterError> {
        let name = pvc.metadata.name.clone().unwrap_or_default();
        self.pvcs(namespace)
            .create(&PostParams::default(), &pvc)
            .await
            .map(|_| ())
            .map_err(|e| map_create_err(e, "PersistentVolumeClaim", namespace, &name))
    }

    async fn delete_pvc(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.pvcs(namespace)
            .delete(name, &foreground_delete_params())
            .await
            .map(|_| ())
            .map_err(|e| map_delete_err(e, "PersistentVolumeClaim", namespace, name))
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: Deployment,
    ) -> Result<(), ClusterError> {
        let name = deployment.metadata.name.clone().unwrap_or_default();
        self.deployments(namespace)
            .create(&PostParams::default(), &deployment)
            .await
            .map(|_| ())
            .map_err(|e| map_create_err(e, "Deployment", namespace, &name))
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, ClusterError> {
        match self.deployments(namespace).get(name).await {
            Ok(dep) => Ok(Some(dep)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(ClusterError::Backend(e.to_string())),
        }
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.deployments(namespace)
            .delete(name, &foreground_delete_params())
            .await
            .map(|_| ())
            .map_err(|e| map_delete_err(e, "Deployment", namespace, name))
    }

    async fn list_deployments(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Deployment>, ClusterError> {
        let lp = ListParams::default().labels(label_selector);
        self.deployments(namespace)
            .list(&lp)
            .await
            .map(|l| l.items)
            .map_err(|e| ClusterError::Backend(e.to_string()))
    }

    async fn create_service(&self, namespace: &str, service: Service) -> Result<(), ClusterError> {
        let name = service.metadata.name.clone().unwrap_or_default();
        self.services(namespace)
            .create(&PostParams::default(), &service)
            .await
            .map(|_| ())
            .map_err(|e| map_create_err(e, "Service", namespace, &name))
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, ClusterError> {
        match self.services(namespace).get(name).await {
            Ok(svc) => Ok(Some(svc)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(ClusterError::Backend(e.to_string())),
        }
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.services(namespace)
            .delete(name, &foreground_delete_params())
            .await
            .map(|_| ())
            .map_err(|e| map_delete_err(e, "Service", namespace, name))
    }

    async fn list_services(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Service>, ClusterError> {
        let lp = ListParams::default().labels(label_selector);
        self.services(namespace)
            .list(&lp)
            .await
            .map(|l| l.items)
            .map_err(|e| ClusterError::Backend(e.to_string()))
    }
}
