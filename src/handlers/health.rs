use crate::app_state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct HealthQuery {
    mode: Option<String>,
}

/// Responds with the health status of the server.
///
/// - By default, only confirms the web server is answering.
/// - With `mode=full`, also checks the account repository and the session
///   store.
///
/// # Responses
/// - `200 OK` with `{ "status": "ok" }` when everything checked is healthy.
/// - `503 SERVICE UNAVAILABLE` with `{ "status": "error" }` when a backend
///   check fails in full mode.
pub async fn health_check(
    State(state): State<AppState>,
    Query(params): Query<HealthQuery>,
) -> (StatusCode, Json<HealthResponse>) {
    // ---
    if params.mode.as_deref() != Some("full") {
        return (StatusCode::OK, Json(HealthResponse { status: "ok" }));
    }

    if let Err(e) = state.repository().health_check().await {
        tracing::error!("Repository health check failed: {:#}", e);
        return unavailable();
    }

    if let Err(e) = state.session_store().health_check().await {
        tracing::error!("Session store health check failed: {:#}", e);
        return unavailable();
    }

    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

fn unavailable() -> (StatusCode, Json<HealthResponse>) {
    // ---
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(HealthResponse { status: "error" }),
    )
}
