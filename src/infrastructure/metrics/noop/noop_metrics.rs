use crate::domain::Metrics;
use std::time::Instant;

/// No-op metrics implementation for testing and metric-less deployments.
#[derive(Default)]
pub struct NoopMetrics;

impl NoopMetrics {
    pub fn new() -> Self {
        NoopMetrics
    }
}

impl Metrics for NoopMetrics {
    // ---
    fn render(&self) -> String {
        String::new()
    }
    fn record_login(&self, _: &str, _: bool) {}
    fn record_counter_replay(&self) {}
    fn record_http_request(&self, _: Instant, _: &str, _: &str, _: u16) {}
}
