//! # AuditSink collaborator
//!
//! Spec.md §2 lists the audit/notification surface as an out-of-scope
//! collaborator, specified only by the narrow contract `SessionManager`
//! consumes: one event at session start, one at session end. This module
//! implements that contract — `AuditSink` plus a `tracing`-backed default
//! implementation — mirroring [`crate::auth::AuthStore`]'s shape. No
//! webhook delivery, no audit-log storage/retention policy: that is the
//! real out-of-scope notification service.

use async_trait::async_trait;

/// Emitted once `CreateSession` has provisioned the full object graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStartedEvent {
    pub session_id: String,
    pub user_id: String,
}

/// Emitted once `DeleteSession` has torn down the object graph (whether or
/// not every delete in the graph succeeded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEndedEvent {
    pub session_id: String,
}

/// The narrow interface `SessionManager` needs from the audit/notification
/// service.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record_session_started(&self, event: SessionStartedEvent);
    async fn record_session_ended(&self, event: SessionEndedEvent);
}

/// Default `AuditSink`: writes one structured `tracing` line per event.
/// Sufficient for a process whose audit trail is its own log stream; a
/// deployment that needs durable audit storage supplies its own
/// `AuditSink` implementation.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record_session_started(&self, event: SessionStartedEvent) {
        tracing::info!(session_id = %event.session_id, user_id = %event.user_id, "session created");
    }

    async fn record_session_ended(&self, event: SessionEndedEvent) {
        tracing::info!(session_id = %event.session_id, "session deleted");
    }
}

#[cfg(test)]
pub use test_support::RecordingAuditSink;

#[cfg(test)]
mod test_support {
    use std::sync::Mutex;

    use super::{AuditSink, SessionEndedEvent, SessionStartedEvent};
    use async_trait::async_trait;

    /// Records every event it receives, for tests that assert
    /// `SessionManager` actually calls into its `AuditSink`.
    #[derive(Debug, Default)]
    pub struct RecordingAuditSink {
        started: Mutex<Vec<SessionStartedEvent>>,
        ended: Mutex<Vec<SessionEndedEvent>>,
    }

    impl RecordingAuditSink {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub fn started_events(&self) -> Vec<SessionStartedEvent> {
            self.started.lock().expect("lock poisoned").clone()
        }

        #[must_use]
        pub fn ended_events(&self) -> Vec<SessionEndedEvent> {
            self.ended.lock().expect("lock poisoned").clone()
        }
    }

    #[async_trait]
    impl AuditSink for RecordingAuditSink {
        async fn record_session_started(&self, event: SessionStartedEvent) {
            self.started.lock().expect("lock poisoned").push(event);
        }

        async fn record_session_ended(&self, event: SessionEndedEvent) {
            self.ended.lock().expect("lock poisoned").push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::RecordingAuditSink;
    use super::*;

    #[tokio::test]
    async fn tracing_sink_handles_both_events_without_panicking() {
        let sink = TracingAuditSink::new();
        sink.record_session_started(SessionStartedEvent {
            session_id: "sess-1".into(),
            user_id: "u1".into(),
        })
        .await;
        sink.record_session_ended(SessionEndedEvent {
            session_id: "sess-1".into(),
        })
        .await;
    }

    #[tokio::test]
    async fn recording_sink_captures_events_in_order() {
        let sink = RecordingAuditSink::new();
        sink.record_session_started(SessionStartedEvent {
            session_id: "sess-1".into(),
            user_id: "u1".into(),
        })
        .await;
        sink.record_session_ended(SessionEndedEvent {
            session_id: "sess-1".into(),
        })
        .await;

        assert_eq!(sink.started_events().len(), 1);
        assert_eq!(sink.ended_events().len(), 1);
        assert_eq!(sink.started_events()[0].user_id, "u1");
    }
}
