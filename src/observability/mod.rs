//! # Observability
//!
//! - `metrics`: Prometheus metrics collection (spec.md §4.8)
//! - `server`: `/metrics`, `/healthz`, `/readyz` HTTP endpoints

pub mod metrics;
pub mod server;
