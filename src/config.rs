//! # ManagerConfig
//!
//! Typed, environment-sourced process configuration (spec.md §6
//! "Configuration inputs"). Loaded once at startup via `from_env()`,
//! following the same `std::env::var(...).ok()`-plus-typed-default shape
//! used by `EncryptionFactoryConfig::from_env` and, in the teacher, by its
//! CRD-field defaulting functions.

use std::collections::HashMap;

use k8s_openapi::api::core::v1::Toleration;

use crate::constants::{
    DEFAULT_CLAUDE_CONFIG_USER_CONFIGMAP_PREFIX, DEFAULT_NAMESPACE,
    DEFAULT_POD_START_TIMEOUT_SECS, DEFAULT_POD_STOP_TIMEOUT_SECS, DEFAULT_SESSION_PORT,
};

/// Resource request/limit quartet shared by the main container and,
/// optionally, the telemetry sidecar.
#[derive(Debug, Clone)]
pub struct ResourceQuartet {
    pub cpu_request: String,
    pub cpu_limit: String,
    pub memory_request: String,
    pub memory_limit: String,
}

impl Default for ResourceQuartet {
    fn default() -> Self {
        Self {
            cpu_request: "100m".to_string(),
            cpu_limit: "1".to_string(),
            memory_request: "256Mi".to_string(),
            memory_limit: "1Gi".to_string(),
        }
    }
}

impl ResourceQuartet {
    fn from_env(prefix: &str) -> Self {
        let default = Self::default();
        Self {
            cpu_request: env_or(&format!("{prefix}_CPU_REQUEST"), default.cpu_request),
            cpu_limit: env_or(&format!("{prefix}_CPU_LIMIT"), default.cpu_limit),
            memory_request: env_or(&format!("{prefix}_MEMORY_REQUEST"), default.memory_request),
            memory_limit: env_or(&format!("{prefix}_MEMORY_LIMIT"), default.memory_limit),
        }
    }
}

/// PersistentVolumeClaim provisioning policy for the `workdir` volume.
#[derive(Debug, Clone)]
pub struct PvcConfig {
    pub enabled: bool,
    pub storage_size: String,
    pub storage_class: Option<String>,
}

impl Default for PvcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            storage_size: "5Gi".to_string(),
            storage_class: None,
        }
    }
}

/// Optional telemetry-collector sidecar policy.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub image: String,
    pub port: i32,
    pub resources: ResourceQuartet,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            image: "otel/opentelemetry-collector-contrib:latest".to_string(),
            port: 4317,
            resources: ResourceQuartet {
                cpu_request: "50m".to_string(),
                cpu_limit: "200m".to_string(),
                memory_request: "64Mi".to_string(),
                memory_limit: "256Mi".to_string(),
            },
        }
    }
}

/// Process-wide configuration driving `PodSpecBuilder` and `SessionManager`,
/// per spec.md §6 "Configuration inputs".
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub namespace: String,
    pub base_port: i32,

    pub image: String,
    pub image_pull_policy: String,
    pub init_container_image: Option<String>,
    pub resources: ResourceQuartet,

    pub pvc: PvcConfig,

    pub claude_config_base_secret: String,
    pub mcp_servers_base_secret: String,
    pub mcp_enabled: bool,
    pub settings_base_secret: String,
    pub claude_config_user_configmap_prefix: String,

    pub github_secret_name: String,
    pub github_config_secret_name: String,

    pub tolerations: Vec<Toleration>,
    pub node_selector: HashMap<String, String>,

    pub pod_start_timeout_secs: u64,
    pub pod_stop_timeout_secs: u64,

    pub telemetry: TelemetryConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            base_port: DEFAULT_SESSION_PORT,
            image: "ghcr.io/agentapi/session-runtime:latest".to_string(),
            image_pull_policy: "IfNotPresent".to_string(),
            init_container_image: None,
            resources: ResourceQuartet::default(),
            pvc: PvcConfig::default(),
            claude_config_base_secret: "claude-config-base".to_string(),
            mcp_servers_base_secret: "mcp-servers-base".to_string(),
            mcp_enabled: true,
            settings_base_secret: "settings-base".to_string(),
            claude_config_user_configmap_prefix: DEFAULT_CLAUDE_CONFIG_USER_CONFIGMAP_PREFIX
                .to_string(),
            github_secret_name: "github-app-auth".to_string(),
            github_config_secret_name: "github-app-config".to_string(),
            tolerations: Vec::new(),
            node_selector: HashMap::new(),
            pod_start_timeout_secs: DEFAULT_POD_START_TIMEOUT_SECS,
            pod_stop_timeout_secs: DEFAULT_POD_STOP_TIMEOUT_SECS,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl ManagerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let default = Self::default();

        let tolerations = std::env::var("AGENTAPI_TOLERATIONS_JSON")
            .ok()
            .and_then(|raw| serde_json::from_str::<Vec<Toleration>>(&raw).ok())
            .unwrap_or_default();

        let node_selector = std::env::var("AGENTAPI_NODE_SELECTOR_JSON")
            .ok()
            .and_then(|raw| serde_json::from_str::<HashMap<String, String>>(&raw).ok())
            .unwrap_or_default();

        Self {
            namespace: env_or("AGENTAPI_NAMESPACE", default.namespace),
            base_port: env_parsed_or("AGENTAPI_BASE_PORT", default.base_port),
            image: env_or("AGENTAPI_SESSION_IMAGE", default.image),
            image_pull_policy: env_or("AGENTAPI_IMAGE_PULL_POLICY", default.image_pull_policy),
            init_container_image: std::env::var("AGENTAPI_INIT_CONTAINER_IMAGE").ok(),
            resources: ResourceQuartet::from_env("AGENTAPI_SESSION"),
            pvc: PvcConfig {
                enabled: env_parsed_or("AGENTAPI_PVC_ENABLED", default.pvc.enabled),
                storage_size: env_or("AGENTAPI_PVC_STORAGE_SIZE", default.pvc.storage_size),
                storage_class: std::env::var("AGENTAPI_PVC_STORAGE_CLASS").ok(),
            },
            claude_config_base_secret: env_or(
                "AGENTAPI_CLAUDE_CONFIG_BASE_SECRET",
                default.claude_config_base_secret,
            ),
            mcp_servers_base_secret: env_or(
                "AGENTAPI_MCP_SERVERS_BASE_SECRET",
                default.mcp_servers_base_secret,
            ),
            mcp_enabled: env_parsed_or("AGENTAPI_MCP_ENABLED", default.mcp_enabled),
            settings_base_secret: env_or(
                "AGENTAPI_SETTINGS_BASE_SECRET",
                default.settings_base_secret,
            ),
            claude_config_user_configmap_prefix: env_or(
                "AGENTAPI_CLAUDE_CONFIG_USER_CONFIGMAP_PREFIX",
                default.claude_config_user_configmap_prefix,
            ),
            github_secret_name: env_or("AGENTAPI_GITHUB_SECRET_NAME", default.github_secret_name),
            github_config_secret_name: env_or(
                "AGENTAPI_GITHUB_CONFIG_SECRET_NAME",
                default.github_config_secret_name,
            ),
            tolerations,
            node_selector,
            pod_start_timeout_secs: env_parsed_or(
                "AGENTAPI_POD_START_TIMEOUT_SECS",
                default.pod_start_timeout_secs,
            ),
            pod_stop_timeout_secs: env_parsed_or(
                "AGENTAPI_POD_STOP_TIMEOUT_SECS",
                default.pod_stop_timeout_secs,
            ),
            telemetry: TelemetryConfig {
                enabled: env_parsed_or("AGENTAPI_TELEMETRY_ENABLED", default.telemetry.enabled),
                image: env_or("AGENTAPI_TELEMETRY_IMAGE", default.telemetry.image),
                port: env_parsed_or("AGENTAPI_TELEMETRY_PORT", default.telemetry.port),
                resources: ResourceQuartet::from_env("AGENTAPI_TELEMETRY"),
            },
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_pvc_enabled() {
        let config = ManagerConfig::default();
        assert!(config.pvc.enabled);
        assert_eq!(config.namespace, "default");
    }

    #[test]
    fn env_parsed_or_falls_back_on_missing_or_invalid() {
        assert_eq!(env_parsed_or::<i32>("AGENTAPI_TEST_DOES_NOT_EXIST", 7), 7);
    }
}
