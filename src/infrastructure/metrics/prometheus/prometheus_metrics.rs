//! Prometheus metrics implementation.
//!
//! Delegates to the sibling `counters.rs` and `recorder.rs` helpers, which
//! use the global `metrics` crate registry. Metrics are registered on
//! first use and rendered through the single global handle.

use crate::domain::Metrics;
use std::time::Instant;

/// Prometheus-based metrics implementation.
///
/// Empty because all state lives in the global registry.
#[derive(Default)]
pub struct PrometheusMetrics {}

impl PrometheusMetrics {
    pub fn new() -> Self {
        tracing::info!("Creating Prometheus metrics");
        PrometheusMetrics {}
    }
}

impl Metrics for PrometheusMetrics {
    fn render(&self) -> String {
        super::render_metrics()
    }

    fn record_login(&self, method: &str, success: bool) {
        super::increment_login(method, success);
    }

    fn record_counter_replay(&self) {
        super::increment_counter_replay();
    }

    fn record_http_request(&self, start: Instant, path: &str, method: &str, status: u16) {
        super::track_http_request(start, path, method, status);
    }
}
