mod counters;
mod prometheus_metrics;
mod recorder;

pub use prometheus_metrics::PrometheusMetrics;
use std::sync::Arc;

pub(crate) use counters::{increment_counter_replay, increment_login, track_http_request};
pub(crate) use recorder::{init_metrics, render_metrics};

/// Creates a new Prometheus metrics implementation.
///
/// Installs the global recorder on first use; the rendered text is served
/// by the router's `/metrics` endpoint.
pub fn create() -> anyhow::Result<crate::domain::MetricsPtr> {
    tracing::info!("Initializing Prometheus metrics");
    init_metrics()?;

    Ok(Arc::new(PrometheusMetrics::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_is_idempotent() {
        assert!(create().is_ok());
        assert!(create().is_ok());
    }

    #[test]
    fn login_counter_is_rendered() {
        let metrics = create().unwrap();
        metrics.record_login("passkey", false);
        metrics.record_counter_replay();

        let text = metrics.render();
        assert!(text.contains("auth_login_total"), "missing counter in:\n{text}");
        assert!(text.contains("auth_counter_replay_total"));
    }
}
