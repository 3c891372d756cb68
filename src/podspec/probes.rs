//! # Probes
//!
//! Liveness and readiness probes for the main session container (spec.md
//! §4.3 "Probes"). Both hit the agent's own `/status` endpoint; only the
//! timing differs, matching the deliberately slower liveness probe so a
//! transient status hiccup doesn't kill the whole Pod.

use k8s_openapi::api::core::v1::{HTTPGetAction, Probe};

fn status_probe(port: i32, initial_delay_secs: i32, period_secs: i32) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some("/status".to_string()),
            port: k8s_openapi::apimachinery::pkg::util::intstr::IntOrString::Int(port),
            ..Default::default()
        }),
        initial_delay_seconds: Some(initial_delay_secs),
        period_seconds: Some(period_secs),
        ..Default::default()
    }
}

/// `initialDelaySeconds: 30, periodSeconds: 10`.
#[must_use]
pub fn liveness(port: i32) -> Probe {
    status_probe(port, 30, 10)
}

/// `initialDelaySeconds: 5, periodSeconds: 5`.
#[must_use]
pub fn readiness(port: i32) -> Probe {
    status_probe(port, 5, 5)
}
