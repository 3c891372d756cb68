//! # Metrics
//!
//! Prometheus metrics for the session manager (SPEC_FULL.md §4.8).
//!
//! ## Metrics exposed
//!
//! - `session_manager_sessions_created_total` - total sessions created
//! - `session_manager_sessions_deleted_total` - total sessions deleted
//! - `session_manager_session_create_duration_seconds` - CreateSession latency
//! - `session_manager_session_delete_duration_seconds` - DeleteSession latency
//! - `session_manager_watcher_status{status}` - sessions currently in each watcher status
//! - `session_manager_encryption_operations_total{algorithm,op}` - encrypt/decrypt calls by backend

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, IntGaugeVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static SESSIONS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "session_manager_sessions_created_total",
        "Total number of sessions created",
    )
    .expect("Failed to create SESSIONS_CREATED_TOTAL metric - this should never happen")
});

static SESSIONS_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "session_manager_sessions_deleted_total",
        "Total number of sessions deleted",
    )
    .expect("Failed to create SESSIONS_DELETED_TOTAL metric - this should never happen")
});

static SESSION_CREATE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "session_manager_session_create_duration_seconds",
            "Duration of CreateSession calls in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create SESSION_CREATE_DURATION metric - this should never happen")
});

static SESSION_DELETE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "session_manager_session_delete_duration_seconds",
            "Duration of DeleteSession calls in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create SESSION_DELETE_DURATION metric - this should never happen")
});

static WATCHER_STATUS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        prometheus::Opts::new(
            "session_manager_watcher_status",
            "Number of sessions currently observed in each watcher status",
        ),
        &["status"],
    )
    .expect("Failed to create WATCHER_STATUS metric - this should never happen")
});

static ENCRYPTION_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "session_manager_encryption_operations_total",
            "Total number of encryption service operations by algorithm and operation",
        ),
        &["algorithm", "op"],
    )
    .expect("Failed to create ENCRYPTION_OPERATIONS_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(SESSIONS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SESSIONS_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SESSION_CREATE_DURATION.clone()))?;
    REGISTRY.register(Box::new(SESSION_DELETE_DURATION.clone()))?;
    REGISTRY.register(Box::new(WATCHER_STATUS.clone()))?;
    REGISTRY.register(Box::new(ENCRYPTION_OPERATIONS_TOTAL.clone()))?;
    Ok(())
}

pub fn record_session_created() {
    SESSIONS_CREATED_TOTAL.inc();
}

pub fn record_session_deleted() {
    SESSIONS_DELETED_TOTAL.inc();
}

pub fn observe_session_create_duration(seconds: f64) {
    SESSION_CREATE_DURATION.observe(seconds);
}

pub fn observe_session_delete_duration(seconds: f64) {
    SESSION_DELETE_DURATION.observe(seconds);
}

/// Set the gauge for `status` to `count`, the number of sessions the
/// watcher currently reports in that status.
pub fn set_watcher_status_count(status: &str, count: i64) {
    WATCHER_STATUS.with_label_values(&[status]).set(count);
}

pub fn record_encryption_operation(algorithm: &str, op: &str) {
    ENCRYPTION_OPERATIONS_TOTAL
        .with_label_values(&[algorithm, op])
        .inc();
}
