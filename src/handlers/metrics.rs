use crate::app_state::AppState;
use axum::{
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;

/// Handler for the `/metrics` endpoint.
///
/// Returns metrics in Prometheus text format for scraping. With the no-op
/// backend the body is empty.
pub async fn metrics_handler(State(app_state): State<AppState>) -> impl IntoResponse {
    // ---
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        app_state.metrics().render(),
    )
}

/// Records request duration per route template, method and status.
///
/// Installed with `route_layer`, so the matched template (not the raw
/// path) is always available as the label.
pub async fn track_http_metrics(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    // ---
    let start = Instant::now();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = request.method().to_string();

    let response = next.run(request).await;

    app_state
        .metrics()
        .record_http_request(start, &path, &method, response.status().as_u16());

    response
}
