//! # Session data model
//!
//! The in-memory handle described in spec.md §3: identity, request
//! parameters, resource names, status, timestamps, and a cancellation
//! handle for the per-session watcher task.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::naming::{self, SessionNames};

/// Which configuration/credential scope a session was created under.
/// Controls which credential Secrets are mounted (spec.md I3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    User,
    Team,
}

impl Scope {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::User => "user",
            Scope::Team => "team",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "team" => Scope::Team,
            _ => Scope::User,
        }
    }
}

/// Session lifecycle status, as reported by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Creating,
    Starting,
    Active,
    Unhealthy,
    Timeout,
    Stopped,
}

impl Status {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Creating => "creating",
            Status::Starting => "starting",
            Status::Active => "active",
            Status::Unhealthy => "unhealthy",
            Status::Timeout => "timeout",
            Status::Stopped => "stopped",
        }
    }
}

/// Information needed to clone a repository inside the session Pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    pub full_name: String,
    pub clone_dir: String,
}

/// Input to `SessionManager::create_session` (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct RunServerRequest {
    pub user_id: String,
    pub scope: Scope,
    pub team_id: Option<String>,
    /// Org/team identifiers used to source team-scoped env-from Secrets.
    pub teams: Vec<String>,
    pub tags: HashMap<String, String>,
    pub repo_info: Option<RepoInfo>,
    pub github_token: Option<String>,
    pub initial_message: Option<String>,
    pub environment: HashMap<String, String>,
}

/// Input to `SessionManager::list_sessions` (spec.md §3). Any subset may be
/// left at its default (empty/`None`), meaning "don't filter on this field".
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub user_id: Option<String>,
    pub scope: Option<Scope>,
    pub team_id: Option<String>,
    pub team_ids: Vec<String>,
    pub status: Option<Status>,
    /// All key/value pairs here must match (AND semantics).
    pub tags: HashMap<String, String>,
}

/// A cooperative cancellation handle shared between a `Session` and its
/// watcher task. Cloning shares the same underlying signal.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl CancellationHandle {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `cancel()` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory handle for one logical interactive agent session, 1:1 with one
/// Deployment (spec.md §3).
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub scope: Scope,
    pub team_id: Option<String>,
    pub tags: HashMap<String, String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: Status,
    pub description: Option<String>,
    pub namespace: String,
    pub service_port: i32,
    pub names: SessionNames,
    pub cancellation: CancellationHandle,
}

impl Session {
    #[must_use]
    pub fn new(id: &str, namespace: &str, service_port: i32, req: &RunServerRequest) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            user_id: req.user_id.clone(),
            scope: req.scope,
            team_id: req.team_id.clone(),
            tags: req.tags.clone(),
            started_at: now,
            updated_at: now,
            status: Status::Creating,
            description: req.initial_message.clone(),
            namespace: namespace.to_string(),
            service_port,
            names: naming::names_for(id),
            cancellation: CancellationHandle::new(),
        }
    }

    pub fn touch(&mut self, status: Status) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Does this session satisfy every populated field of `filter`?
    #[must_use]
    pub fn matches(&self, filter: &Filter) -> bool {
        if let Some(user_id) = &filter.user_id {
            if &self.user_id != user_id {
                return false;
            }
        }
        if let Some(scope) = filter.scope {
            if self.scope != scope {
                return false;
            }
        }
        if let Some(team_id) = &filter.team_id {
            if self.team_id.as_deref() != Some(team_id.as_str()) {
                return false;
            }
        }
        if !filter.team_ids.is_empty() {
            let matches_any = self
                .team_id
                .as_ref()
                .is_some_and(|t| filter.team_ids.contains(t));
            if !matches_any {
                return false;
            }
        }
        if let Some(status) = filter.status {
            if self.status != status {
                return false;
            }
        }
        for (k, v) in &filter.tags {
            if self.tags.get(k) != Some(v) {
                return false;
            }
        }
        true
    }
}
