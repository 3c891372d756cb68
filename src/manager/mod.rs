//! # SessionManager
//!
//! The state machine in spec.md §4.4: a staged-rollback creation pipeline,
//! cluster-backed Get/List with lazy rehydration, foreground delete, and a
//! restart-durable `Shutdown`. Generic over `ClusterApi` so production runs
//! against `KubeClusterApi` and tests run against `FakeClusterApi`
//! (SPEC_FULL.md §9).

pub mod selector;
pub mod watcher;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::audit::{AuditSink, SessionEndedEvent, SessionStartedEvent, TracingAuditSink};
use crate::cluster::{is_deletion_in_progress, ClusterApi};
use crate::config::ManagerConfig;
use crate::constants::{ANNOTATION_CREATED_AT, ANNOTATION_TEAM_ID, LABEL_SCOPE, LABEL_SESSION_ID, LABEL_USER_ID};
use crate::encryption::EncryptionRegistry;
use crate::error::SessionError;
use crate::naming;
use crate::observability::metrics;
use crate::podspec;
use crate::session::{Filter, RunServerRequest, Scope, Session, Status};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

type SessionMap = Arc<RwLock<HashMap<String, Session>>>;

/// Create/Get/List/Delete lifecycle, the background watcher pool, and the
/// in-memory session map (spec.md §2, §4.4).
pub struct SessionManager<C: ClusterApi> {
    cluster: Arc<C>,
    config: ManagerConfig,
    encryption: Arc<EncryptionRegistry>,
    audit: Arc<dyn AuditSink>,
    sessions: SessionMap,
    intervals: watcher::WatcherIntervals,
}

impl<C: ClusterApi + 'static> SessionManager<C> {
    /// Audits session start/end through a `tracing`-backed [`AuditSink`];
    /// see [`Self::with_audit_sink`] to supply a different one.
    #[must_use]
    pub fn new(cluster: C, config: ManagerConfig, encryption: EncryptionRegistry) -> Self {
        let intervals = watcher::WatcherIntervals::from_config(&config);
        Self {
            cluster: Arc::new(cluster),
            config,
            encryption: Arc::new(encryption),
            audit: Arc::new(TracingAuditSink::new()),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            intervals,
        }
    }

    /// Replaces the default `tracing`-backed [`AuditSink`] with `audit`, for
    /// callers whose audit trail lives somewhere other than the process log.
    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    async fn remove_session(&self, id: &str) {
        self.sessions.write().await.remove(id);
    }

    fn spawn_watcher(&self, session: &Session) {
        watcher::spawn(
            Arc::clone(&self.cluster),
            Arc::clone(&self.sessions),
            session.id.clone(),
            session.namespace.clone(),
            session.names.deployment.clone(),
            session.cancellation.clone(),
            self.intervals,
        );
    }

    /// spec.md §4.4 "CreateSession": nine ordered steps, each compensated on
    /// failure.
    #[tracing::instrument(skip(self, request), fields(session_id = %id))]
    pub async fn create_session(&self, id: &str, request: RunServerRequest) -> Result<Session, SessionError> {
        let start = Instant::now();
        let result = self.create_session_inner(id, request).await;
        metrics::observe_session_create_duration(start.elapsed().as_secs_f64());
        if result.is_ok() {
            metrics::record_session_created();
        }
        result
    }

    async fn create_session_inner(&self, id: &str, request: RunServerRequest) -> Result<Session, SessionError> {
        let session = Session::new(id, &self.config.namespace, self.config.base_port, &request);
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());

        let base_secret =
            podspec::build_base_claude_config_secret(&self.config.claude_config_base_secret, &self.config.namespace);
        if let Err(error) = self.cluster.ensure_secret(&self.config.namespace, base_secret).await {
            self.remove_session(&session.id).await;
            return Err(error.into());
        }

        let mut pvc_created = false;
        if self.config.pvc.enabled {
            let pvc = podspec::build_pvc(&session, &self.config);
            match self.cluster.create_pvc(&self.config.namespace, pvc).await {
                Ok(()) => pvc_created = true,
                Err(error) if error.is_already_exists() => pvc_created = true,
                Err(error) => {
                    self.remove_session(&session.id).await;
                    return Err(error.into());
                }
            }
        }

        if let Some(message) = &request.initial_message {
            self.try_ensure_initial_message_secret(&session, message).await;
        }

        if let Some(token) = &request.github_token {
            self.try_ensure_github_token_secret(&session, token).await;
        }

        let deployment = podspec::build_deployment(&session, &request, &self.config);
        if let Err(error) = self.cluster.create_deployment(&self.config.namespace, deployment).await {
            if pvc_created {
                let _ = self.cluster.delete_pvc(&self.config.namespace, &session.names.pvc).await;
            }
            self.remove_session(&session.id).await;
            return Err(error.into());
        }

        let service = podspec::build_service(&session);
        if let Err(error) = self.cluster.create_service(&self.config.namespace, service).await {
            let _ = self
                .cluster
                .delete_deployment(&self.config.namespace, &session.names.deployment)
                .await;
            if pvc_created {
                let _ = self.cluster.delete_pvc(&self.config.namespace, &session.names.pvc).await;
            }
            self.remove_session(&session.id).await;
            return Err(error.into());
        }

        self.spawn_watcher(&session);

        self.audit
            .record_session_started(SessionStartedEvent {
                session_id: session.id.clone(),
                user_id: session.user_id.clone(),
            })
            .await;
        Ok(session)
    }

    /// Step 4: failure is logged and swallowed, the sidecar tolerates an
    /// absent Secret.
    async fn try_ensure_initial_message_secret(&self, session: &Session, message: &str) {
        match self.encryption.encrypt(message.as_bytes()).await {
            Ok(encrypted) => {
                metrics::record_encryption_operation(&encrypted.metadata.algorithm, "encrypt");
                let secret = podspec::secrets::initial_message_secret(session, &encrypted);
                if let Err(error) = self.cluster.ensure_secret(&session.namespace, secret).await {
                    tracing::warn!(session_id = %session.id, %error, "failed to create initial-message secret");
                }
            }
            Err(error) => {
                tracing::warn!(session_id = %session.id, %error, "failed to encrypt initial message");
            }
        }
    }

    /// Step 5: same tolerance as step 4.
    async fn try_ensure_github_token_secret(&self, session: &Session, token: &str) {
        match self.encryption.encrypt(token.as_bytes()).await {
            Ok(encrypted) => {
                metrics::record_encryption_operation(&encrypted.metadata.algorithm, "encrypt");
                let secret = podspec::secrets::github_token_secret(session, &encrypted);
                if let Err(error) = self.cluster.ensure_secret(&session.namespace, secret).await {
                    tracing::warn!(session_id = %session.id, %error, "failed to create github-token secret");
                }
            }
            Err(error) => {
                tracing::warn!(session_id = %session.id, %error, "failed to encrypt github token");
            }
        }
    }

    /// spec.md §4.4 "GetSession".
    #[tracing::instrument(skip(self))]
    pub async fn get_session(&self, id: &str) -> Result<Option<Session>, SessionError> {
        if let Some(session) = self.sessions.read().await.get(id).cloned() {
            return Ok(Some(session));
        }
        self.rehydrate(id).await
    }

    async fn rehydrate(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let service_name = naming::service_name(id);
        let Some(service) = self.cluster.get_service(&self.config.namespace, &service_name).await? else {
            return Ok(None);
        };
        if is_deletion_in_progress(&service.metadata) {
            return Ok(None);
        }

        let deployment = self
            .cluster
            .get_deployment(&self.config.namespace, &naming::deployment_name(id))
            .await?;

        let session = self.session_from_service(id, &service, deployment.as_ref()).await;
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        self.spawn_watcher(&session);
        Ok(Some(session))
    }

    /// Reconstruct a `Session` from a live Service's labels/annotations,
    /// the Deployment's current status (if known), and the initial-message
    /// Secret's plaintext (best-effort; a decrypt failure just leaves
    /// `description` unset).
    async fn session_from_service(&self, id: &str, service: &Service, deployment: Option<&Deployment>) -> Session {
        let labels = service.metadata.labels.clone().unwrap_or_default();
        let annotations = service.metadata.annotations.clone().unwrap_or_default();

        let user_id = labels.get(LABEL_USER_ID).cloned().unwrap_or_default();
        let scope = match labels.get(LABEL_SCOPE).map(String::as_str) {
            Some("team") => Scope::Team,
            _ => Scope::User,
        };
        let team_id = annotations.get(ANNOTATION_TEAM_ID).cloned();

        let started_at = annotations
            .get(ANNOTATION_CREATED_AT)
            .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(chrono::Utc::now);

        let service_port = service
            .spec
            .as_ref()
            .and_then(|spec| spec.ports.as_ref())
            .and_then(|ports| ports.first())
            .map_or(self.config.base_port, |port| port.port);

        let names = naming::names_for(id);
        let description = self.decrypt_initial_message(&service.metadata, &names.initial_message_secret).await;

        let status = deployment.map_or(Status::Starting, |dep| {
            let dep_status = dep.status.clone().unwrap_or_default();
            let ready = dep_status.ready_replicas.unwrap_or(0);
            let replicas = dep_status.replicas.unwrap_or(0);
            if ready > 0 {
                Status::Active
            } else if replicas > 0 {
                Status::Starting
            } else {
                Status::Unhealthy
            }
        });

        Session {
            id: id.to_string(),
            user_id,
            scope,
            team_id,
            tags: crate::podspec::labels::tags_from_labels(&labels),
            started_at,
            updated_at: chrono::Utc::now(),
            status,
            description,
            namespace: self.config.namespace.clone(),
            service_port,
            names,
            cancellation: crate::session::CancellationHandle::new(),
        }
    }

    async fn decrypt_initial_message(&self, service_meta: &ObjectMeta, secret_name: &str) -> Option<String> {
        let namespace = service_meta.namespace.clone().unwrap_or_else(|| self.config.namespace.clone());
        let secret = self.cluster.get_secret(&namespace, secret_name).await.ok()??;
        let raw = secret.string_data.as_ref().and_then(|m| m.get("message")).cloned()?;
        let encrypted: crate::encryption::EncryptedData = serde_json::from_str(&raw).ok()?;
        let plaintext = self.encryption.decrypt(&encrypted).await.ok()?;
        metrics::record_encryption_operation(&encrypted.metadata.algorithm, "decrypt");
        String::from_utf8(plaintext).ok()
    }

    /// spec.md §4.4 "ListSessions".
    #[tracing::instrument(skip(self, filter))]
    pub async fn list_sessions(&self, filter: &Filter) -> Result<Vec<Session>, SessionError> {
        let label_selector = selector::build_selector(filter);
        let services = self.cluster.list_services(&self.config.namespace, &label_selector).await?;
        let deployments = self.cluster.list_deployments(&self.config.namespace, &label_selector).await?;

        let mut deployments_by_session_id: HashMap<String, Deployment> = HashMap::new();
        for deployment in deployments {
            if let Some(session_id) = deployment
                .metadata
                .labels
                .as_ref()
                .and_then(|l| l.get(LABEL_SESSION_ID))
                .cloned()
            {
                deployments_by_session_id.insert(session_id, deployment);
            }
        }

        let mut results = Vec::new();
        for service in services {
            if is_deletion_in_progress(&service.metadata) {
                continue;
            }
            let Some(session_id) = service
                .metadata
                .labels
                .as_ref()
                .and_then(|l| l.get(LABEL_SESSION_ID))
                .cloned()
            else {
                continue;
            };

            let session = if let Some(existing) = self.sessions.read().await.get(&session_id).cloned() {
                existing
            } else {
                let deployment = deployments_by_session_id.get(&session_id);
                let session = self.session_from_service(&session_id, &service, deployment).await;
                self.sessions
                    .write()
                    .await
                    .insert(session.id.clone(), session.clone());
                self.spawn_watcher(&session);
                session
            };

            if session.matches(filter) {
                results.push(session);
            }
        }

        Ok(results)
    }

    /// spec.md §4.4 "DeleteSession": foreground-delete the object graph,
    /// concatenating (never short-circuiting on) errors.
    #[tracing::instrument(skip(self))]
    pub async fn delete_session(&self, id: &str) -> Result<(), SessionError> {
        let start = Instant::now();
        let result = self.delete_session_inner(id).await;
        metrics::observe_session_delete_duration(start.elapsed().as_secs_f64());
        if result.is_ok() {
            metrics::record_session_deleted();
        }
        result
    }

    async fn delete_session_inner(&self, id: &str) -> Result<(), SessionError> {
        let session = match self.sessions.read().await.get(id).cloned() {
            Some(session) => session,
            None => match self.rehydrate(id).await? {
                Some(session) => session,
                None => return Err(SessionError::NotFound(id.to_string())),
            },
        };

        session.cancellation.cancel();

        let deadline = Duration::from_secs(self.config.pod_stop_timeout_secs);
        let errors = tokio::time::timeout(deadline, self.delete_object_graph(&session))
            .await
            .unwrap_or_else(|_| vec!["delete timed out".to_string()]);

        self.remove_session(id).await;
        self.audit
            .record_session_ended(SessionEndedEvent {
                session_id: id.to_string(),
            })
            .await;

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SessionError::PartialDelete {
                id: id.to_string(),
                errors,
            })
        }
    }

    async fn delete_object_graph(&self, session: &Session) -> Vec<String> {
        let namespace = &session.namespace;
        let mut errors = Vec::new();

        if let Err(error) = self.cluster.delete_service(namespace, &session.names.service).await {
            if !error.is_not_found() {
                errors.push(error.to_string());
            }
        }
        if let Err(error) = self.cluster.delete_deployment(namespace, &session.names.deployment).await {
            if !error.is_not_found() {
                errors.push(error.to_string());
            }
        }
        if self.config.pvc.enabled {
            if let Err(error) = self.cluster.delete_pvc(namespace, &session.names.pvc).await {
                if !error.is_not_found() {
                    errors.push(error.to_string());
                }
            }
        }
        if let Err(error) = self
            .cluster
            .delete_secret(namespace, &session.names.initial_message_secret)
            .await
        {
            if !error.is_not_found() {
                errors.push(error.to_string());
            }
        }
        if let Err(error) = self
            .cluster
            .delete_secret(namespace, &session.names.github_token_secret)
            .await
        {
            if !error.is_not_found() {
                errors.push(error.to_string());
            }
        }

        errors
    }

    /// spec.md §4.4 "Shutdown": drop the in-memory map only. State lives in
    /// the cluster so a fresh manager can rehydrate it on next start-up.
    pub async fn shutdown(&self) {
        self.sessions.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::fake::FakeClusterApi;
    use crate::encryption::{EncryptionRegistry, Passthrough};
    use std::sync::Arc as StdArc;

    fn manager_with_passthrough() -> SessionManager<FakeClusterApi> {
        let mut registry = EncryptionRegistry::new();
        registry.set_primary(StdArc::new(Passthrough::new()));
        let mut config = ManagerConfig::default();
        config.namespace = "default".to_string();
        SessionManager::new(FakeClusterApi::new(), config, registry)
    }

    #[tokio::test]
    async fn create_then_get_session_round_trips() {
        let manager = manager_with_passthrough();
        let request = RunServerRequest {
            user_id: "u1".into(),
            ..Default::default()
        };
        let created = manager.create_session("sess-1", request).await.unwrap();
        assert_eq!(created.status, Status::Creating);

        let fetched = manager.get_session("sess-1").await.unwrap().unwrap();
        assert_eq!(fetched.id, "sess-1");
    }

    #[tokio::test]
    async fn create_session_creates_deployment_and_service() {
        let manager = manager_with_passthrough();
        let request = RunServerRequest {
            user_id: "u1".into(),
            ..Default::default()
        };
        let session = manager.create_session("sess-1", request).await.unwrap();

        let deployment = manager
            .cluster
            .get_deployment(&manager.config.namespace, &session.names.deployment)
            .await
            .unwrap();
        assert!(deployment.is_some());

        let service = manager
            .cluster
            .get_service(&manager.config.namespace, &session.names.service)
            .await
            .unwrap();
        assert!(service.is_some());
    }

    #[tokio::test]
    async fn delete_session_removes_from_memory() {
        let manager = manager_with_passthrough();
        let request = RunServerRequest {
            user_id: "u1".into(),
            ..Default::default()
        };
        manager.create_session("sess-1", request).await.unwrap();
        manager.delete_session("sess-1").await.unwrap();

        assert!(manager.sessions.read().await.get("sess-1").is_none());
    }

    #[tokio::test]
    async fn delete_session_missing_everywhere_is_not_found() {
        let manager = manager_with_passthrough();
        let error = manager.delete_session("does-not-exist").await.unwrap_err();
        assert!(matches!(error, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn shutdown_clears_memory_without_touching_cluster() {
        let manager = manager_with_passthrough();
        let request = RunServerRequest {
            user_id: "u1".into(),
            ..Default::default()
        };
        let session = manager.create_session("sess-1", request).await.unwrap();
        manager.shutdown().await;

        assert!(manager.sessions.read().await.is_empty());
        let deployment = manager
            .cluster
            .get_deployment(&manager.config.namespace, &session.names.deployment)
            .await
            .unwrap();
        assert!(deployment.is_some());
    }

    #[tokio::test]
    async fn list_sessions_filters_by_user_id() {
        let manager = manager_with_passthrough();
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
        manager
            .create_session(
                "sess-2",
                RunServerRequest {
                    user_id: "u2".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let found = manager
            .list_sessions(&Filter {
                user_id: Some("u1".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "sess-1");
    }

    #[tokio::test]
    async fn team_scope_session_never_mounts_user_credentials_scenario_5() {
        let manager = manager_with_passthrough();
        let request = RunServerRequest {
            user_id: "u1".into(),
            scope: Scope::Team,
            team_id: Some("org/team-a".into()),
            ..Default::default()
        };
        let session = manager.create_session("sess-1", request).await.unwrap();

        let deployment = manager
            .cluster
            .get_deployment(&manager.config.namespace, &session.names.deployment)
            .await
            .unwrap()
            .unwrap();
        let main = deployment
            .spec
            .unwrap()
            .template
            .spec
            .unwrap()
            .containers
            .into_iter()
            .find(|c| c.name == "agentapi")
            .unwrap();
        let secret_names: Vec<String> = main
            .env_from
            .unwrap()
            .into_iter()
            .filter_map(|e| e.secret_ref.map(|r| r.name))
            .collect();
        assert!(!secret_names.contains(&crate::podspec::env::agent_env_secret_name("u1")));
    }

    #[tokio::test]
    async fn create_and_delete_each_record_exactly_one_audit_event() {
        let recorder = StdArc::new(crate::audit::RecordingAuditSink::new());
        let mut registry = EncryptionRegistry::new();
        registry.set_primary(StdArc::new(Passthrough::new()));
        let manager = SessionManager::new(FakeClusterApi::new(), ManagerConfig::default(), registry)
            .with_audit_sink(recorder.clone());

        let request = RunServerRequest {
            user_id: "u1".into(),
            ..Default::default()
        };
        manager.create_session("sess-1", request).await.unwrap();
        manager.delete_session("sess-1").await.unwrap();

        let started = recorder.started_events();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].session_id, "sess-1");
        assert_eq!(started[0].user_id, "u1");

        let ended = recorder.ended_events();
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].session_id, "sess-1");
    }
}
