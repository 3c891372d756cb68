//! # Volumes
//!
//! Every volume/mount pair a session Pod needs (spec.md §4.3 "Volumes").
//! Built as small named constructors so the PVC-enabled/disabled and
//! user/team-scope branches stay table-driven instead of duplicated per
//! call site, the same helper-extraction style the teacher uses in
//! `provider::common`.

use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, EmptyDirVolumeSource, PersistentVolumeClaimVolumeSource,
    ProjectedVolumeSource, SecretProjection, SecretVolumeSource, Volume, VolumeMount,
    VolumeProjection,
};

use crate::config::ManagerConfig;
use crate::constants::WORKDIR_MOUNT_PATH;
use crate::session::{RunServerRequest, Scope, Session};

const CLAUDE_CONFIG_BASE_MOUNT: &str = "/home/agentapi/.claude-base";
const CLAUDE_CONFIG_USER_MOUNT: &str = "/home/agentapi/.claude-user";
const CLAUDE_CONFIG_MOUNT: &str = "/home/agentapi/.claude";
const CLAUDE_CREDENTIALS_MOUNT: &str = "/home/agentapi/.claude/credentials";
const NOTIFICATION_SOURCE_MOUNT: &str = "/var/run/agentapi/notification-subscriptions-source";
const NOTIFICATIONS_MOUNT: &str = "/var/run/agentapi/notifications";
const GITHUB_APP_MOUNT: &str = "/github-app";
const INITIAL_MESSAGE_MOUNT: &str = "/var/run/agentapi/initial-message";
const INITIAL_MESSAGE_STATE_MOUNT: &str = "/var/run/agentapi/initial-message-state";
const MCP_CONFIG_SOURCE_MOUNT: &str = "/var/run/agentapi/mcp-config-source";
const MCP_CONFIG_MOUNT: &str = "/var/run/agentapi/mcp-config";
const SETTINGS_CONFIG_SOURCE_MOUNT: &str = "/var/run/agentapi/settings-config-source";
const SETTINGS_CONFIG_MOUNT: &str = "/var/run/agentapi/settings-config";
const OTELCOL_CONFIG_MOUNT: &str = "/etc/otelcol";

fn scratch_volume(name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }
}

fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

/// `workdir`: PVC-backed if PVC-enabled (default), else ephemeral scratch.
fn workdir_volume(session: &Session, pvc_enabled: bool) -> (Volume, VolumeMount) {
    let volume = if pvc_enabled {
        Volume {
            name: "workdir".to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: session.names.pvc.clone(),
                read_only: Some(false),
            }),
            ..Default::default()
        }
    } else {
        scratch_volume("workdir")
    };
    (volume, mount("workdir", WORKDIR_MOUNT_PATH))
}

/// `claude-credentials`: per-user Secret if scope=user, empty scratch if
/// scope=team. Enforced at the volume level so team sessions can never see
/// user credentials (spec.md §4.3, P7).
fn claude_credentials_volume(request: &RunServerRequest) -> (Volume, VolumeMount) {
    let volume = match request.scope {
        Scope::User => Volume {
            name: "claude-credentials".to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(format!(
                    "claude-credentials-{}",
                    crate::naming::sanitize_secret_name(&request.user_id, "claude-credentials-".len())
                )),
                optional: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        },
        Scope::Team => scratch_volume("claude-credentials"),
    };
    (volume, mount("claude-credentials", CLAUDE_CREDENTIALS_MOUNT))
}

fn projected_secret_sources(secret_names: &[String]) -> Vec<VolumeProjection> {
    secret_names
        .iter()
        .map(|name| VolumeProjection {
            secret: Some(SecretProjection {
                name: name.clone(),
                optional: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect()
}

/// base ⊕ team[] ⊕ user projected Secret sources, used identically by
/// `mcp-config-source` and `settings-config-source`.
fn scoped_projection_sources(
    base_secret: &str,
    request: &RunServerRequest,
    per_scope_secret: impl Fn(&str) -> String,
) -> Vec<String> {
    let mut names = vec![base_secret.to_string()];
    match request.scope {
        Scope::Team => {
            if let Some(team_id) = &request.team_id {
                names.push(per_scope_secret(team_id));
            }
        }
        Scope::User => {
            for team in &request.teams {
                names.push(per_scope_secret(team));
            }
            names.push(per_scope_secret(&request.user_id));
        }
    }
    names
}

fn projected_source_volume(name: &str, secret_names: &[String]) -> Volume {
    Volume {
        name: name.to_string(),
        projected: Some(ProjectedVolumeSource {
            sources: Some(projected_secret_sources(secret_names)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Every volume + matching main-container mount for one session Pod.
#[must_use]
pub fn build(
    session: &Session,
    request: &RunServerRequest,
    config: &ManagerConfig,
) -> (Vec<Volume>, Vec<VolumeMount>) {
    let mut volumes = Vec::new();
    let mut mounts = Vec::new();

    let (workdir_vol, workdir_mount) = workdir_volume(session, config.pvc.enabled);
    volumes.push(workdir_vol);
    mounts.push(workdir_mount);

    volumes.push(Volume {
        name: "claude-config-base".to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(config.claude_config_base_secret.clone()),
            optional: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    });
    mounts.push(mount("claude-config-base", CLAUDE_CONFIG_BASE_MOUNT));

    volumes.push(Volume {
        name: "claude-config-user".to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: format!(
                "{}{}",
                config.claude_config_user_configmap_prefix,
                crate::naming::sanitize_secret_name(&request.user_id, 0)
            ),
            optional: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    });
    mounts.push(mount("claude-config-user", CLAUDE_CONFIG_USER_MOUNT));

    volumes.push(scratch_volume("claude-config"));
    mounts.push(mount("claude-config", CLAUDE_CONFIG_MOUNT));

    let (cred_vol, cred_mount) = claude_credentials_volume(request);
    volumes.push(cred_vol);
    mounts.push(cred_mount);

    volumes.push(Volume {
        name: "notification-subscriptions-source".to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(format!(
                "notification-subscriptions-{}",
                crate::naming::sanitize_secret_name(&request.user_id, "notification-subscriptions-".len())
            )),
            optional: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    });
    mounts.push(mount(
        "notification-subscriptions-source",
        NOTIFICATION_SOURCE_MOUNT,
    ));

    volumes.push(scratch_volume("notifications"));
    mounts.push(mount("notifications", NOTIFICATIONS_MOUNT));

    volumes.push(scratch_volume("github-app"));
    mounts.push(mount("github-app", GITHUB_APP_MOUNT));

    if request.initial_message.is_some() {
        volumes.push(Volume {
            name: "initial-message".to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(session.names.initial_message_secret.clone()),
                optional: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        });
        mounts.push(mount("initial-message", INITIAL_MESSAGE_MOUNT));

        volumes.push(scratch_volume("initial-message-state"));
        mounts.push(mount("initial-message-state", INITIAL_MESSAGE_STATE_MOUNT));
    }

    let mcp_sources = scoped_projection_sources(
        &config.mcp_servers_base_secret,
        request,
        |scope_id| format!("mcp-servers-{}", crate::naming::sanitize_secret_name(scope_id, "mcp-servers-".len())),
    );
    volumes.push(projected_source_volume("mcp-config-source", &mcp_sources));
    mounts.push(mount("mcp-config-source", MCP_CONFIG_SOURCE_MOUNT));
    volumes.push(scratch_volume("mcp-config"));
    mounts.push(mount("mcp-config", MCP_CONFIG_MOUNT));

    let settings_sources = scoped_projection_sources(
        &config.settings_base_secret,
        request,
        |scope_id| format!("settings-{}", crate::naming::sanitize_secret_name(scope_id, "settings-".len())),
    );
    volumes.push(projected_source_volume(
        "settings-config-source",
        &settings_sources,
    ));
    mounts.push(mount("settings-config-source", SETTINGS_CONFIG_SOURCE_MOUNT));
    volumes.push(scratch_volume("settings-config"));
    mounts.push(mount("settings-config", SETTINGS_CONFIG_MOUNT));

    if config.telemetry.enabled {
        volumes.push(Volume {
            name: "otelcol-config".to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: "otelcol-config".to_string(),
                optional: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        });
        mounts.push(mount("otelcol-config", OTELCOL_CONFIG_MOUNT));
    }

    (volumes, mounts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_and_request(scope: Scope) -> (Session, RunServerRequest) {
        let req = RunServerRequest {
            user_id: "u1".into(),
            scope,
            team_id: Some("org/team-a".into()),
            initial_message: Some("hi".into()),
            ..Default::default()
        };
        let session = Session::new("sess-1", "default", 3284, &req);
        (session, req)
    }

    #[test]
    fn team_scope_uses_scratch_credentials_volume_p7() {
        let (_, req) = session_and_request(Scope::Team);
        let (volume, _) = claude_credentials_volume(&req);
        assert!(volume.secret.is_none());
        assert!(volume.empty_dir.is_some());
    }

    #[test]
    fn user_scope_uses_secret_credentials_volume() {
        let (_, req) = session_and_request(Scope::User);
        let (volume, _) = claude_credentials_volume(&req);
        assert!(volume.secret.is_some());
    }

    #[test]
    fn workdir_uses_pvc_when_enabled() {
        let (session, _) = session_and_request(Scope::User);
        let (volume, _) = workdir_volume(&session, true);
        assert!(volume.persistent_volume_claim.is_some());
    }

    #[test]
    fn workdir_uses_scratch_when_pvc_disabled() {
        let (session, _) = session_and_request(Scope::User);
        let (volume, _) = workdir_volume(&session, false);
        assert!(volume.empty_dir.is_some());
    }

    #[test]
    fn initial_message_volumes_present_only_when_requested() {
        let config = ManagerConfig::default();
        let (session, req) = session_and_request(Scope::User);
        let (volumes, _) = build(&session, &req, &config);
        assert!(volumes.iter().any(|v| v.name == "initial-message"));
        assert!(volumes.iter().any(|v| v.name == "initial-message-state"));

        let mut req_no_message = req;
        req_no_message.initial_message = None;
        let (volumes, _) = build(&session, &req_no_message, &config);
        assert!(!volumes.iter().any(|v| v.name == "initial-message"));
    }

    #[test]
    fn every_volume_has_a_matching_mount() {
        let config = ManagerConfig::default();
        let (session, req) = session_and_request(Scope::User);
        let (volumes, mounts) = build(&session, &req, &config);
        assert_eq!(volumes.len(), mounts.len());
    }
}
