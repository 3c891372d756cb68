//! # PodSpecBuilder
//!
//! Pure functions mapping (session, request, cluster config) onto the
//! Kubernetes objects a session needs: Deployment, Service, PVC, and the
//! Secrets `secrets::initial_message_secret`/`secrets::github_token_secret`
//! build once their payload has been encrypted (spec.md §4.3, §2 "System
//! overview" table). Nothing in this module touches the network; it only
//! shapes data.

pub mod containers;
pub mod env;
pub mod labels;
pub mod probes;
pub mod secrets;
pub mod volumes;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, PersistentVolumeClaimSpec, PodSpec, PodTemplateSpec, ResourceRequirements, Secret, Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use crate::config::ManagerConfig;
use crate::session::{RunServerRequest, Session};

fn object_meta(name: &str, session: &Session) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(session.namespace.clone()),
        labels: Some(labels::for_session(session)),
        annotations: Some(labels::annotations_for_session(session)),
        ..Default::default()
    }
}

fn selector_for(session: &Session) -> LabelSelector {
    let mut match_labels = std::collections::BTreeMap::new();
    match_labels.insert(
        crate::constants::LABEL_SESSION_ID.to_string(),
        crate::naming::sanitize_label(&session.id),
    );
    LabelSelector {
        match_labels: Some(match_labels),
        ..Default::default()
    }
}

/// Build the session's Deployment: one replica, the label-selector pinned
/// to the session id, and the full init-container/sidecar/main-container
/// topology.
#[must_use]
pub fn build_deployment(session: &Session, request: &RunServerRequest, config: &ManagerConfig) -> Deployment {
    let (volumes, all_mounts) = volumes::build(session, request, config);
    let init = containers::init_containers(request, config, &all_mounts);
    let mut containers = containers::sidecars(request, config, &all_mounts);
    containers.push(containers::main_container(
        session,
        request,
        config,
        all_mounts,
    ));

    let selector = selector_for(session);

    Deployment {
        metadata: object_meta(&session.names.deployment, session),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: selector.clone(),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels::for_session(session)),
                    annotations: Some(labels::annotations_for_session(session)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    init_containers: Some(init),
                    containers,
                    volumes: Some(volumes),
                    tolerations: if config.tolerations.is_empty() {
                        None
                    } else {
                        Some(config.tolerations.clone())
                    },
                    node_selector: if config.node_selector.is_empty() {
                        None
                    } else {
                        Some(config.node_selector.clone().into_iter().collect())
                    },
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the session's Service: stable network identity addressed by
/// `SessionNames::service`, used by `GetSession`/`ListSessions` rehydration
/// (spec.md §4.4).
#[must_use]
pub fn build_service(session: &Session) -> Service {
    Service {
        metadata: object_meta(&session.names.service, session),
        spec: Some(ServiceSpec {
            selector: Some(selector_for(session).match_labels.unwrap_or_default()),
            ports: Some(vec![ServicePort {
                port: session.service_port,
                target_port: Some(k8s_openapi::apimachinery::pkg::util::intstr::IntOrString::Int(
                    session.service_port,
                )),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the session's `workdir` PVC. Only invoked when `config.pvc.enabled`.
#[must_use]
pub fn build_pvc(session: &Session, config: &ManagerConfig) -> PersistentVolumeClaim {
    let mut requests = std::collections::BTreeMap::new();
    requests.insert(
        "storage".to_string(),
        Quantity(config.pvc.storage_size.clone()),
    );

    PersistentVolumeClaim {
        metadata: object_meta(&session.names.pvc, session),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(ResourceRequirements {
                requests: Some(requests),
                ..Default::default()
            }),
            storage_class_name: config.pvc.storage_class.clone(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Process-wide `claude-config-base` Secret, created once at startup
/// (spec.md §4.4 step 2) and treated as idempotent via `ClusterApi::ensure_secret`.
#[must_use]
pub fn build_base_claude_config_secret(name: &str, namespace: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}
