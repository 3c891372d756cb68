//! # Init containers, sidecars & main container
//!
//! Builds the Pod's container topology (spec.md §4.3 "Init containers",
//! "Sidecars"). Init containers run in strict order against shared scratch
//! volumes; each step is idempotent so a Pod restart can safely re-run them.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, EnvFromSource, EnvVar, ResourceRequirements, VolumeMount};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use crate::config::{ManagerConfig, ResourceQuartet};
use crate::constants::GITHUB_APP_PEM_PATH;
use crate::podspec::env;
use crate::podspec::probes;
use crate::session::{RunServerRequest, Session};

fn resource_requirements(quartet: &ResourceQuartet) -> ResourceRequirements {
    let mut requests = BTreeMap::new();
    requests.insert("cpu".to_string(), Quantity(quartet.cpu_request.clone()));
    requests.insert("memory".to_string(), Quantity(quartet.memory_request.clone()));

    let mut limits = BTreeMap::new();
    limits.insert("cpu".to_string(), Quantity(quartet.cpu_limit.clone()));
    limits.insert("memory".to_string(), Quantity(quartet.memory_limit.clone()));

    ResourceRequirements {
        requests: Some(requests),
        limits: Some(limits),
        ..Default::default()
    }
}

fn find_mount(mounts: &[VolumeMount], name: &str) -> VolumeMount {
    mounts
        .iter()
        .find(|m| m.name == name)
        .cloned()
        .unwrap_or_else(|| VolumeMount {
            name: name.to_string(),
            mount_path: String::new(),
            ..Default::default()
        })
}

fn init_container(
    name: &str,
    image: &str,
    command: Vec<String>,
    mounts: Vec<VolumeMount>,
) -> Container {
    Container {
        name: name.to_string(),
        image: Some(image.to_string()),
        command: Some(command),
        volume_mounts: Some(mounts),
        ..Default::default()
    }
}

/// Init containers in strict execution order: `clone-repo` (conditional on
/// `repoInfo`) → `merge-settings` → `sync-config` → `setup-mcp` (conditional
/// on MCP being enabled).
#[must_use]
pub fn init_containers(
    request: &RunServerRequest,
    config: &ManagerConfig,
    all_mounts: &[VolumeMount],
) -> Vec<Container> {
    let image = config
        .init_container_image
        .as_deref()
        .unwrap_or(config.image.as_str());
    let mut containers = Vec::new();

    if let Some(repo) = &request.repo_info {
        containers.push(init_container(
            "clone-repo",
            image,
            vec![
                "clone-repo".to_string(),
                "--repo".to_string(),
                repo.full_name.clone(),
                "--dest".to_string(),
                repo.clone_dir.clone(),
            ],
            vec![
                find_mount(all_mounts, "workdir"),
                find_mount(all_mounts, "github-app"),
            ],
        ));
    }

    containers.push(init_container(
        "merge-settings",
        image,
        vec!["merge-settings".to_string()],
        vec![
            find_mount(all_mounts, "settings-config-source"),
            find_mount(all_mounts, "settings-config"),
        ],
    ));

    containers.push(init_container(
        "sync-config",
        image,
        vec!["sync-config".to_string()],
        vec![
            find_mount(all_mounts, "claude-config-base"),
            find_mount(all_mounts, "claude-config-user"),
            find_mount(all_mounts, "claude-config"),
        ],
    ));

    if config.mcp_enabled {
        containers.push(init_container(
            "setup-mcp",
            image,
            vec!["setup-mcp".to_string()],
            vec![
                find_mount(all_mounts, "mcp-config-source"),
                find_mount(all_mounts, "mcp-config"),
            ],
        ));
    }

    containers
}

/// `credentials-sync`: long-running, polls the credentials file and
/// writes/updates a per-user Secret via a patch-then-create strategy so it
/// never needs `get` RBAC on the Secret it maintains.
fn credentials_sync_sidecar(image: &str, all_mounts: &[VolumeMount]) -> Container {
    Container {
        name: "credentials-sync".to_string(),
        image: Some(image.to_string()),
        command: Some(vec!["credentials-sync".to_string()]),
        volume_mounts: Some(vec![find_mount(all_mounts, "claude-credentials")]),
        ..Default::default()
    }
}

/// `initial-message-sender`: one-shot-then-sleep. Gates on server readiness
/// and on the absence of any `user`-role message already on the agent;
/// preserves both guards so a Pod restart can never double-send.
fn initial_message_sender_sidecar(image: &str, all_mounts: &[VolumeMount]) -> Container {
    Container {
        name: "initial-message-sender".to_string(),
        image: Some(image.to_string()),
        command: Some(vec!["initial-message-sender".to_string()]),
        volume_mounts: Some(vec![
            find_mount(all_mounts, "initial-message"),
            find_mount(all_mounts, "initial-message-state"),
        ]),
        ..Default::default()
    }
}

fn telemetry_sidecar(config: &ManagerConfig, all_mounts: &[VolumeMount]) -> Container {
    Container {
        name: "otel-collector".to_string(),
        image: Some(config.telemetry.image.clone()),
        resources: Some(resource_requirements(&config.telemetry.resources)),
        volume_mounts: Some(vec![find_mount(all_mounts, "otelcol-config")]),
        ..Default::default()
    }
}

/// Sidecar (co-)containers: `credentials-sync`, `initial-message-sender`
/// (only if the request carried an initial message), optional telemetry
/// collector.
#[must_use]
pub fn sidecars(
    request: &RunServerRequest,
    config: &ManagerConfig,
    all_mounts: &[VolumeMount],
) -> Vec<Container> {
    let mut containers = vec![credentials_sync_sidecar(&config.image, all_mounts)];

    if request.initial_message.is_some() {
        containers.push(initial_message_sender_sidecar(&config.image, all_mounts));
    }

    if config.telemetry.enabled {
        containers.push(telemetry_sidecar(config, all_mounts));
    }

    containers
}

/// The main `agentapi` container: env, env-from, volume mounts, probes.
#[must_use]
pub fn main_container(
    session: &Session,
    request: &RunServerRequest,
    config: &ManagerConfig,
    all_mounts: Vec<VolumeMount>,
) -> Container {
    let mut env_vars: Vec<EnvVar> = env::direct_env_vars(session, request);
    env_vars.push(EnvVar {
        name: "GITHUB_APP_PEM_PATH".to_string(),
        value: Some(GITHUB_APP_PEM_PATH.to_string()),
        ..Default::default()
    });

    let mut env_from: Vec<EnvFromSource> = env::credential_env_from(request);
    env_from.extend(env::github_env_from(
        session,
        request,
        &config.github_secret_name,
        &config.github_config_secret_name,
    ));

    Container {
        name: "agentapi".to_string(),
        image: Some(config.image.clone()),
        image_pull_policy: Some(config.image_pull_policy.clone()),
        ports: Some(vec![k8s_openapi::api::core::v1::ContainerPort {
            container_port: session.service_port,
            ..Default::default()
        }]),
        env: Some(env_vars),
        env_from: Some(env_from),
        volume_mounts: Some(all_mounts),
        resources: Some(resource_requirements(&config.resources)),
        liveness_probe: Some(probes::liveness(session.service_port)),
        readiness_probe: Some(probes::readiness(session.service_port)),
        ..Default::default()
    }
}
