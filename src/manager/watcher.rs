//! # Watcher
//!
//! Two-phase background poll of a session's Deployment (spec.md §4.4
//! "Watcher"). Phase A polls fast, bounded by `PodStartTimeout`, waiting
//! for the first ready replica. Phase B polls slowly forever, reporting
//! steady-state health until the Deployment disappears or the session is
//! cancelled. Intervals are injectable so tests can run the whole state
//! machine at millisecond speed (SPEC_FULL.md §9).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::cluster::ClusterApi;
use crate::config::ManagerConfig;
use crate::constants::{
    DEFAULT_POD_START_TIMEOUT_SECS, WATCHER_FAST_POLL_SECS, WATCHER_SLOW_POLL_SECS,
};
use crate::session::{CancellationHandle, Session, Status};

/// Poll cadence, injectable so tests don't wait on real-world seconds.
#[derive(Debug, Clone, Copy)]
pub struct WatcherIntervals {
    pub fast_poll: Duration,
    pub slow_poll: Duration,
    pub start_timeout: Duration,
}

impl Default for WatcherIntervals {
    fn default() -> Self {
        Self {
            fast_poll: Duration::from_secs(WATCHER_FAST_POLL_SECS),
            slow_poll: Duration::from_secs(WATCHER_SLOW_POLL_SECS),
            start_timeout: Duration::from_secs(DEFAULT_POD_START_TIMEOUT_SECS),
        }
    }
}

impl WatcherIntervals {
    #[must_use]
    pub fn from_config(config: &ManagerConfig) -> Self {
        Self {
            fast_poll: Duration::from_secs(WATCHER_FAST_POLL_SECS),
            slow_poll: Duration::from_secs(WATCHER_SLOW_POLL_SECS),
            start_timeout: Duration::from_secs(config.pod_start_timeout_secs),
        }
    }
}

async fn set_status(sessions: &RwLock<HashMap<String, Session>>, id: &str, status: Status) {
    if let Some(session) = sessions.write().await.get_mut(id) {
        session.touch(status);
    }
}

/// Spawn the watcher task for one session. Returns immediately; the task
/// runs until the Deployment disappears or `cancellation` fires.
pub fn spawn<C: ClusterApi + 'static>(
    cluster: Arc<C>,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    session_id: String,
    namespace: String,
    deployment_name: String,
    cancellation: CancellationHandle,
    intervals: WatcherIntervals,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run(
            cluster.as_ref(),
            &sessions,
            &session_id,
            &namespace,
            &deployment_name,
            &cancellation,
            intervals,
        )
        .await;
    })
}

async fn run<C: ClusterApi>(
    cluster: &C,
    sessions: &RwLock<HashMap<String, Session>>,
    session_id: &str,
    namespace: &str,
    deployment_name: &str,
    cancellation: &CancellationHandle,
    intervals: WatcherIntervals,
) {
    if !phase_a(cluster, sessions, session_id, namespace, deployment_name, cancellation, intervals).await {
        return;
    }
    phase_b(cluster, sessions, session_id, namespace, deployment_name, cancellation, intervals).await;
}

/// Fast poll until the Deployment reports a ready replica. Returns `true`
/// to proceed into phase B, `false` if the watcher should stop entirely
/// (cancelled, deployment gone, or start-timeout exceeded).
async fn phase_a<C: ClusterApi>(
    cluster: &C,
    sessions: &RwLock<HashMap<String, Session>>,
    session_id: &str,
    namespace: &str,
    deployment_name: &str,
    cancellation: &CancellationHandle,
    intervals: WatcherIntervals,
) -> bool {
    let deadline = tokio::time::Instant::now() + intervals.start_timeout;
    let mut ticker = tokio::time::interval(intervals.fast_poll);
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancellation.cancelled() => return false,
            _ = ticker.tick() => {
                if tokio::time::Instant::now() >= deadline {
                    set_status(sessions, session_id, Status::Timeout).await;
                    return false;
                }
                match cluster.get_deployment(namespace, deployment_name).await {
                    Ok(Some(dep)) => {
                        let ready = dep.status.as_ref().and_then(|s| s.ready_replicas).unwrap_or(0);
                        if ready > 0 {
                            set_status(sessions, session_id, Status::Active).await;
                            return true;
                        }
                    }
                    Ok(None) => return false,
                    Err(error) => {
                        tracing::warn!(session_id, %error, "watcher: failed to poll deployment in phase A");
                    }
                }
            }
        }
    }
}

/// Slow poll forever, reporting steady-state health, until the Deployment
/// disappears or the session is cancelled.
async fn phase_b<C: ClusterApi>(
    cluster: &C,
    sessions: &RwLock<HashMap<String, Session>>,
    session_id: &str,
    namespace: &str,
    deployment_name: &str,
    cancellation: &CancellationHandle,
    intervals: WatcherIntervals,
) {
    let mut ticker = tokio::time::interval(intervals.slow_poll);
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancellation.cancelled() => return,
            _ = ticker.tick() => {
                match cluster.get_deployment(namespace, deployment_name).await {
                    Ok(Some(dep)) => {
                        let status = dep.status.unwrap_or_default();
                        let ready = status.ready_replicas.unwrap_or(0);
                        let replicas = status.replicas.unwrap_or(0);
                        let next = if ready > 0 {
                            Status::Active
                        } else if replicas > 0 {
                            Status::Starting
                        } else {
                            Status::Unhealthy
                        };
                        set_status(sessions, session_id, next).await;
                    }
                    Ok(None) => {
                        set_status(sessions, session_id, Status::Stopped).await;
                        return;
                    }
                    Err(error) => {
                        tracing::warn!(session_id, %error, "watcher: failed to poll deployment in phase B");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::fake::FakeClusterApi;
    use crate::session::RunServerRequest;
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn millisecond_intervals() -> WatcherIntervals {
        WatcherIntervals {
            fast_poll: Duration::from_millis(5),
            slow_poll: Duration::from_millis(5),
            start_timeout: Duration::from_millis(50),
        }
    }

    fn sessions_with(session: Session) -> Arc<RwLock<HashMap<String, Session>>> {
        Arc::new(RwLock::new(HashMap::from([(session.id.clone(), session)])))
    }

    fn deployment(name: &str) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn phase_a_transitions_to_active_on_ready_replica() {
        let cluster = Arc::new(FakeClusterApi::new());
        cluster.create_deployment("ns", deployment("dep-1")).await.unwrap();
        cluster.set_deployment_status("ns", "dep-1", 1, 1);

        let session = Session::new("sess-1", "ns", 3284, &RunServerRequest::default());
        let cancellation = session.cancellation.clone();
        let sessions = sessions_with(session);

        run(
            cluster.as_ref(),
            &sessions,
            "sess-1",
            "ns",
            "dep-1",
            &cancellation,
            millisecond_intervals(),
        )
        .await;

        cancellation.cancel();
        assert_eq!(sessions.read().await.get("sess-1").unwrap().status, Status::Active);
    }

    #[tokio::test]
    async fn phase_a_times_out_without_ready_replica() {
        let cluster = Arc::new(FakeClusterApi::new());
        cluster.create_deployment("ns", deployment("dep-1")).await.unwrap();

        let session = Session::new("sess-1", "ns", 3284, &RunServerRequest::default());
        let cancellation = session.cancellation.clone();
        let sessions = sessions_with(session);

        run(
            cluster.as_ref(),
            &sessions,
            "sess-1",
            "ns",
            "dep-1",
            &cancellation,
            millisecond_intervals(),
        )
        .await;

        assert_eq!(sessions.read().await.get("sess-1").unwrap().status, Status::Timeout);
    }

    #[tokio::test]
    async fn missing_deployment_stops_watcher_immediately() {
        let cluster = Arc::new(FakeClusterApi::new());
        let session = Session::new("sess-1", "ns", 3284, &RunServerRequest::default());
        let cancellation = session.cancellation.clone();
        let sessions = sessions_with(session);

        run(
            cluster.as_ref(),
            &sessions,
            "sess-1",
            "ns",
            "dep-missing",
            &cancellation,
            millisecond_intervals(),
        )
        .await;

        // Never progressed past Creating since the deployment never existed.
        assert_eq!(sessions.read().await.get("sess-1").unwrap().status, Status::Creating);
    }

    #[tokio::test]
    async fn phase_b_reports_unhealthy_then_stopped() {
        let cluster = Arc::new(FakeClusterApi::new());
        cluster.create_deployment("ns", deployment("dep-1")).await.unwrap();
        cluster.set_deployment_status("ns", "dep-1", 1, 1);

        let session = Session::new("sess-1", "ns", 3284, &RunServerRequest::default());
        let cancellation = session.cancellation.clone();
        let sessions = sessions_with(session);
        let intervals = millisecond_intervals();

        assert!(
            phase_a(cluster.as_ref(), &sessions, "sess-1", "ns", "dep-1", &cancellation, intervals).await
        );
        assert_eq!(sessions.read().await.get("sess-1").unwrap().status, Status::Active);

        cluster.set_deployment_status("ns", "dep-1", 0, 0);
        let watcher_sessions = Arc::clone(&sessions);
        let watcher_cancellation = cancellation.clone();
        let cluster_for_task = Arc::clone(&cluster);
        let handle = tokio::spawn(async move {
            phase_b(
                cluster_for_task.as_ref(),
                &watcher_sessions,
                "sess-1",
                "ns",
                "dep-1",
                &watcher_cancellation,
                intervals,
            )
            .await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sessions.read().await.get("sess-1").unwrap().status, Status::Unhealthy);

        cluster.delete_deployment("ns", "dep-1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.await.unwrap();
        assert_eq!(sessions.read().await.get("sess-1").unwrap().status, Status::Stopped);
    }

    #[tokio::test]
    async fn cancellation_stops_phase_a_immediately() {
        let cluster = Arc::new(FakeClusterApi::new());
        cluster.create_deployment("ns", deployment("dep-1")).await.unwrap();

        let session = Session::new("sess-1", "ns", 3284, &RunServerRequest::default());
        let cancellation = session.cancellation.clone();
        let sessions = sessions_with(session);
        cancellation.cancel();

        let proceeded = phase_a(
            cluster.as_ref(),
            &sessions,
            "sess-1",
            "ns",
            "dep-1",
            &cancellation,
            millisecond_intervals(),
        )
        .await;

        assert!(!proceeded);
    }
}
