//! # Env vars & env-from Secrets
//!
//! Builds the main container's direct env vars (spec.md §6 "Environment
//! variables injected into every session Pod") and its `envFrom` list
//! (spec.md §4.3 "Env-from Secrets", invariant I3).

use k8s_openapi::api::core::v1::{EnvFromSource, EnvVar, SecretEnvSource};

use crate::constants::{ENV_SECRET_PREFIX, GITHUB_APP_PEM_PATH, SESSION_HOME};
use crate::naming::sanitize_secret_name;
use crate::session::{RunServerRequest, Scope, Session};

/// Direct (non-`envFrom`) environment variables, per spec.md §6.
#[must_use]
pub fn direct_env_vars(session: &Session, request: &RunServerRequest) -> Vec<EnvVar> {
    let mut vars = vec![
        env("AGENTAPI_PORT", session.service_port.to_string()),
        env("AGENTAPI_SESSION_ID", &session.id),
        env("AGENTAPI_USER_ID", &session.user_id),
        env("HOME", SESSION_HOME),
        env("GITHUB_APP_PEM_PATH", GITHUB_APP_PEM_PATH),
    ];

    if let Some(team_id) = &session.team_id {
        vars.push(env("AGENTAPI_TEAM_ID", team_id));
    }

    if let Some(repo) = &request.repo_info {
        vars.push(env("AGENTAPI_REPO_FULLNAME", &repo.full_name));
        vars.push(env("AGENTAPI_CLONE_DIR", &repo.clone_dir));
    }

    for (key, value) in &request.environment {
        vars.push(env(key, value));
    }

    vars
}

fn env(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

/// `agent-env-<sanitized-team-or-user>` Secret name.
#[must_use]
pub fn agent_env_secret_name(identifier: &str) -> String {
    format!("{ENV_SECRET_PREFIX}{}", sanitize_secret_name(identifier, ENV_SECRET_PREFIX.len()))
}

fn optional_secret_env_from(secret_name: &str) -> EnvFromSource {
    EnvFromSource {
        secret_ref: Some(SecretEnvSource {
            name: secret_name.to_string(),
            optional: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Credential `envFrom` Secrets, following the scope rule (I3): a
/// team-scoped session mounts exactly `agent-env-<teamID>`, never the
/// user's; a user-scoped session mounts one `agent-env-<team>` per
/// `req.teams` plus the user's own.
#[must_use]
pub fn credential_env_from(request: &RunServerRequest) -> Vec<EnvFromSource> {
    match request.scope {
        Scope::Team => {
            let team_id = request.team_id.as_deref().unwrap_or_default();
            vec![optional_secret_env_from(&agent_env_secret_name(team_id))]
        }
        Scope::User => {
            let mut sources: Vec<EnvFromSource> = request
                .teams
                .iter()
                .map(|team| optional_secret_env_from(&agent_env_secret_name(team)))
                .collect();
            sources.push(optional_secret_env_from(&agent_env_secret_name(
                &request.user_id,
            )));
            sources
        }
    }
}

/// GitHub `envFrom` Secrets (spec.md §4.3). If a `githubToken` was supplied,
/// mount only the config Secret plus the session-scoped token Secret,
/// never the global auth Secret (avoids leaking the App private key).
#[must_use]
pub fn github_env_from(
    session: &Session,
    request: &RunServerRequest,
    github_secret_name: &str,
    github_config_secret_name: &str,
) -> Vec<EnvFromSource> {
    let mut sources = vec![optional_secret_env_from(github_config_secret_name)];
    if request.github_token.is_some() {
        sources.push(optional_secret_env_from(&session.names.github_token_secret));
    } else {
        sources.push(optional_secret_env_from(github_secret_name));
    }
    sources
}
