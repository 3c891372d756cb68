//! Integration coverage for `SessionManager` driven entirely through the
//! public API against `FakeClusterApi` (spec.md §8 acceptance scenarios).
//! Requires the `test-util` feature, which exposes `cluster::fake`.

use std::collections::HashMap;
use std::sync::Arc;

use agentapi_session_manager::cluster::fake::FakeClusterApi;
use agentapi_session_manager::config::ManagerConfig;
use agentapi_session_manager::encryption::{EncryptionRegistry, Passthrough};
use agentapi_session_manager::manager::SessionManager;
use agentapi_session_manager::session::{Filter, RunServerRequest, Scope, Status};

fn manager() -> SessionManager<FakeClusterApi> {
    let mut registry = EncryptionRegistry::new();
    registry.set_primary(Arc::new(Passthrough::new()));
    SessionManager::new(FakeClusterApi::new(), ManagerConfig::default(), registry)
}

#[tokio::test]
async fn create_happy_path_provisions_the_full_object_graph() {
    let manager = manager();
    let request = RunServerRequest {
        user_id: "u1".into(),
        tags: HashMap::from([("project".to_string(), "demo".to_string())]),
        initial_message: Some("build me a todo app".into()),
        ..Default::default()
    };

    let session = manager.create_session("sess-1", request).await.unwrap();
    assert_eq!(session.status, Status::Creating);
    assert_eq!(session.user_id, "u1");

    let listed = manager.list_sessions(&Filter::default()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "sess-1");
}

#[tokio::test]
async fn team_scoped_session_is_fenced_from_other_teams() {
    let manager = manager();
    manager
        .create_session(
            "sess-a",
            RunServerRequest {
                user_id: "u1".into(),
                scope: Scope::Team,
                team_id: Some("org/team-a".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    manager
        .create_session(
            "sess-b",
            RunServerRequest {
                user_id: "u2".into(),
                scope: Scope::Team,
                team_id: Some("org/team-b".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let team_a_only = manager
        .list_sessions(&Filter {
            team_id: Some("org/team-a".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(team_a_only.len(), 1);
    assert_eq!(team_a_only[0].id, "sess-a");
}

#[tokio::test]
async fn restart_recovers_sessions_from_live_cluster_state() {
    let mut registry = EncryptionRegistry::new();
    registry.set_primary(Arc::new(Passthrough::new()));
    let config = ManagerConfig::default();
    let cluster = FakeClusterApi::new();

    let original = SessionManager::new(cluster, config.clone(), registry);
    let request = RunServerRequest {
        user_id: "u1".into(),
        scope: Scope::Team,
        team_id: Some("org/team-a".into()),
        tags: HashMap::from([("env".to_string(), "staging".to_string())]),
        initial_message: Some("resume my work".into()),
        ..Default::default()
    };
    let created = original.create_session("sess-1", request).await.unwrap();

    // Simulate a process restart: the in-memory map is gone, but the
    // cluster still holds every object the session produced, so the next
    // `GetSession` rehydrates it from scratch.
    original.shutdown().await;
    let rehydrated = original.get_session("sess-1").await.unwrap().unwrap();

    assert_eq!(rehydrated.id, created.id);
    assert_eq!(rehydrated.user_id, "u1");
    assert_eq!(rehydrated.scope, Scope::Team);
    assert_eq!(rehydrated.team_id.as_deref(), Some("org/team-a"));
    assert_eq!(rehydrated.tags.get("env"), Some(&"staging".to_string()));
    assert_eq!(rehydrated.description.as_deref(), Some("resume my work"));
}

#[tokio::test]
async fn delete_then_get_reports_session_absent() {
    let manager = manager();
    manager
        .create_session(
            "sess-1",
            RunServerRequest {
                user_id: "u1".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    manager.delete_session("sess-1").await.unwrap();

    assert!(manager.get_session("sess-1").await.unwrap().is_none());
}
