//! # Bootstrap
//!
//! On manager start-up, hydrates the in-memory `AuthStore` from cluster
//! state (spec.md §4.6). Grounded on the teacher's `Reconciler::new`
//! SOPS-private-key bootstrap sequence (`src/reconciler.rs`
//! `load_sops_private_key`): probe for an expected object, warn and
//! continue past any single failure, never fail the whole process over one
//! missing or unreadable item.

use std::sync::Arc;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::auth::{AuthStore, PersonalApiKey, TeamServiceAccount};
use crate::cluster::ClusterApi;
use crate::naming::sanitize_secret_name;

const TEAM_SA_PREFIX: &str = "team-sa-";
const PERSONAL_KEY_PREFIX: &str = "user-api-key-";
const TOKEN_DATA_KEY: &str = "token";
const API_KEY_DATA_KEY: &str = "api-key";

fn team_sa_secret_name(team_id: &str) -> String {
    format!("{TEAM_SA_PREFIX}{}", sanitize_secret_name(team_id, TEAM_SA_PREFIX.len()))
}

fn personal_key_secret_name(user_id: &str) -> String {
    format!(
        "{PERSONAL_KEY_PREFIX}{}",
        sanitize_secret_name(user_id, PERSONAL_KEY_PREFIX.len())
    )
}

fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    secret
        .string_data
        .as_ref()
        .and_then(|m| m.get(key))
        .cloned()
        .or_else(|| {
            secret
                .data
                .as_ref()
                .and_then(|m| m.get(key))
                .map(|v| String::from_utf8_lossy(&v.0).into_owned())
        })
}

fn token_secret(name: &str, namespace: &str, key: &str, value: &str) -> Secret {
    let mut string_data = std::collections::BTreeMap::new();
    string_data.insert(key.to_string(), value.to_string());
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        string_data: Some(string_data),
        ..Default::default()
    }
}

/// Hydrates `auth` from cluster state for one team config: load the
/// existing service-account Secret if one exists, otherwise mint and
/// persist a new token. Failures are logged and the item is skipped; they
/// never abort the run.
async fn bootstrap_team<C: ClusterApi>(cluster: &C, auth: &dyn AuthStore, namespace: &str, team_id: &str) {
    let name = team_sa_secret_name(team_id);
    match cluster.get_secret(namespace, &name).await {
        Ok(Some(secret)) => {
            let Some(token) = secret_value(&secret, TOKEN_DATA_KEY) else {
                tracing::warn!(team_id, secret = %name, "team service account secret has no token, skipping");
                return;
            };
            auth.put_team_service_account(TeamServiceAccount {
                team_id: team_id.to_string(),
                token,
            })
            .await;
        }
        Ok(None) => {
            let token = uuid::Uuid::new_v4().to_string();
            let secret = token_secret(&name, namespace, TOKEN_DATA_KEY, &token);
            if let Err(error) = cluster.ensure_secret(namespace, secret).await {
                tracing::warn!(team_id, %error, "failed to create team service account secret, skipping");
                return;
            }
            auth.put_team_service_account(TeamServiceAccount {
                team_id: team_id.to_string(),
                token,
            })
            .await;
        }
        Err(error) => {
            tracing::warn!(team_id, %error, "failed to load team service account, skipping");
        }
    }
}

/// Hydrates `auth` from cluster state for one personal API key. Unlike
/// team configs, a missing Secret here is not created — the key must
/// already exist, and its absence is logged and skipped.
async fn bootstrap_personal_key<C: ClusterApi>(cluster: &C, auth: &dyn AuthStore, namespace: &str, user_id: &str) {
    let name = personal_key_secret_name(user_id);
    match cluster.get_secret(namespace, &name).await {
        Ok(Some(secret)) => {
            let Some(key) = secret_value(&secret, API_KEY_DATA_KEY) else {
                tracing::warn!(user_id, secret = %name, "personal api key secret has no key, skipping");
                return;
            };
            auth.put_personal_api_key(PersonalApiKey {
                user_id: user_id.to_string(),
                key,
            })
            .await;
        }
        Ok(None) => {
            tracing::warn!(user_id, secret = %name, "personal api key secret not found, skipping");
        }
        Err(error) => {
            tracing::warn!(user_id, %error, "failed to load personal api key, skipping");
        }
    }
}

/// Orchestrates startup hydration of the auth collaborator (spec.md §4.6).
pub struct Bootstrap<C: ClusterApi> {
    cluster: Arc<C>,
    namespace: String,
}

impl<C: ClusterApi> Bootstrap<C> {
    #[must_use]
    pub fn new(cluster: Arc<C>, namespace: String) -> Self {
        Self { cluster, namespace }
    }

    /// Iterate the team-config and personal-API-key collections, hydrating
    /// `auth`. Per-item failures are logged and skipped; the bootstrap as a
    /// whole always succeeds (spec.md §4.6).
    pub async fn run(&self, auth: &dyn AuthStore, team_ids: &[String], user_ids: &[String]) {
        for team_id in team_ids {
            bootstrap_team(self.cluster.as_ref(), auth, &self.namespace, team_id).await;
        }
        for user_id in user_ids {
            bootstrap_personal_key(self.cluster.as_ref(), auth, &self.namespace, user_id).await;
        }
        tracing::info!(
            teams = team_ids.len(),
            users = user_ids.len(),
            "bootstrap complete"
        );
    }
}
