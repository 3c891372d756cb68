//! # agentapi-session-manager
//!
//! Boots the session manager process: loads configuration from the
//! environment, builds a Kubernetes client, hydrates the auth collaborator
//! from cluster state, and serves `/metrics`, `/healthz`, `/readyz`
//! (spec.md §6, §4.6, §4.8). The `SessionManager` itself is a library type
//! consumed by the real `AgentAPI` proxy process over whatever RPC surface
//! it chooses; this binary only owns bootstrap and observability.

use std::sync::Arc;

use agentapi_session_manager::auth::InMemoryAuthStore;
use agentapi_session_manager::bootstrap::Bootstrap;
use agentapi_session_manager::cluster::KubeClusterApi;
use agentapi_session_manager::config::ManagerConfig;
use agentapi_session_manager::encryption::factory::EncryptionFactoryConfig;
use agentapi_session_manager::encryption::{EncryptionFactory, EncryptionRegistry};
use agentapi_session_manager::observability::server::{start_server, ServerState};
use agentapi_session_manager::observability::metrics;
use anyhow::{Context, Result};
use kube::Client;
use tracing::{error, info};

fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .ok()
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentapi_session_manager=info".into()),
        )
        .init();

    info!("starting agentapi-session-manager");

    metrics::register_metrics()?;

    let server_state = ServerState::new();
    let server_state_for_task = Arc::clone(&server_state);
    let metrics_port = std::env::var("METRICS_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(agentapi_session_manager::constants::DEFAULT_METRICS_PORT);

    tokio::spawn(async move {
        if let Err(error) = start_server(metrics_port, server_state_for_task).await {
            error!(%error, "observability http server failed");
        }
    });

    let config = ManagerConfig::from_env();

    let client = Client::try_default()
        .await
        .context("failed to build Kubernetes client")?;
    let cluster = Arc::new(KubeClusterApi::new(client));

    let encryption_config = EncryptionFactoryConfig::from_env();
    let primary_encryption = EncryptionFactory::create(&encryption_config).await;
    let mut encryption = EncryptionRegistry::new();
    encryption.set_primary(primary_encryption);

    let auth = InMemoryAuthStore::new();
    let team_ids = env_list("AGENTAPI_BOOTSTRAP_TEAM_IDS");
    let user_ids = env_list("AGENTAPI_BOOTSTRAP_USER_IDS");

    let bootstrap = Bootstrap::new(Arc::clone(&cluster), config.namespace.clone());
    bootstrap.run(&auth, &team_ids, &user_ids).await;

    server_state.mark_ready();
    info!("bootstrap complete, ready to serve");

    // `SessionManager`/`MarketplaceSyncer` are consumed by the proxy process
    // over its own RPC surface (out of scope here, spec.md §2); this binary
    // exists to hydrate shared state and keep the observability server alive.
    std::future::pending::<()>().await;

    Ok(())
}
