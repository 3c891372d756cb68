//! # ClusterApi
//!
//! The narrow seam between `SessionManager`/`MarketplaceSyncer`/`Bootstrap`
//! and the Kubernetes API. Grounded on the same "externalize the
//! collaborator behind a trait" move the teacher uses for
//! `SecretManagerProvider`/`ConfigStoreProvider` (`src/provider/mod.rs`),
//! applied here to the one collaborator whose behavior spec.md's
//! invariants actually describe, so `SessionManager`'s state machine is
//! unit-testable without a live cluster (see SPEC_FULL.md §9).

pub mod kube_impl;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service};

use crate::error::ClusterError;

pub use kube_impl::KubeClusterApi;

/// Everything `SessionManager` needs from the Kubernetes API, expressed as
/// an async trait so production code can run against a real `kube::Client`
/// and tests can run against an in-memory fake.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<(), ClusterError>;
    /// Create-if-missing; `AlreadyExists` is treated as success by callers
    /// that need idempotent ensure-semantics (spec.md §4.4 step 2, §9).
    async fn ensure_secret(&self, namespace: &str, secret: Secret) -> Result<(), ClusterError> {
        match self.create_secret(namespace, secret).await {
            Ok(()) | Err(ClusterError::AlreadyExists { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ClusterError>;
    /// Server-side-apply merge patch, used where the caller must update an
    /// existing object in place (spec.md §4.5 `MarketplaceSyncer`).
    async fn update_secret(&self, namespace: &str, secret: Secret) -> Result<(), ClusterError>;
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    async fn create_pvc(
        &self,
        namespace: &str,
        pvc: PersistentVolumeClaim,
    ) -> Result<(), ClusterError>;
    async fn delete_pvc(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: Deployment,
    ) -> Result<(), ClusterError>;
    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, ClusterError>;
    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;
    async fn list_deployments(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Deployment>, ClusterError>;

    async fn create_service(&self, namespace: &str, service: Service) -> Result<(), ClusterError>;
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, ClusterError>;
    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;
    async fn list_services(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Service>, ClusterError>;
}

/// Is this object in the middle of a foreground deletion? Such objects are
/// treated as absent by `GetSession`/`ListSessions` (spec.md §4.4).
#[must_use]
pub fn is_deletion_in_progress(metadata: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> bool {
    metadata.deletion_timestamp.is_some()
}
