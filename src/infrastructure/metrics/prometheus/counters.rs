use metrics::{counter, histogram};
use std::time::Instant;

/// Count a login attempt by method and outcome.
pub fn increment_login(method: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("auth_login_total", "method" => method.to_string(), "outcome" => outcome).increment(1);
}

/// Count an assertion rejected for a non-advancing signature counter.
pub fn increment_counter_replay() {
    counter!("auth_counter_replay_total").increment(1);
}

/// Track HTTP request latency using a histogram.
pub fn track_http_request(start: Instant, path: &str, method: &str, status: u16) {
    let elapsed = start.elapsed();
    histogram!(
        "http_request_duration_seconds",
        "path" => path.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .record(elapsed);
}
