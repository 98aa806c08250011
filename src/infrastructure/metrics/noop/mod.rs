// src/infrastructure/metrics/noop/mod.rs
mod noop_metrics;

pub use noop_metrics::NoopMetrics;
use std::sync::Arc;

/// Creates a new no-op metrics implementation.
///
/// All metrics calls are ignored and `render` returns an empty body.
pub fn create() -> anyhow::Result<crate::domain::MetricsPtr> {
    Ok(Arc::new(NoopMetrics::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_renders_nothing() {
        let metrics = create().unwrap();
        metrics.record_login("password", true);
        metrics.record_counter_replay();
        assert!(metrics.render().is_empty());
    }
}
