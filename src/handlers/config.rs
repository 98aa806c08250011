//! Permission matrix endpoints.

use crate::app_state::AppState;
use crate::domain::{AuthError, PermissionMatrix};
use crate::session::AuthContext;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct PermissionsUpdated {
    // ---
    pub success: bool,
    pub permissions: PermissionMatrix,
}

/// `GET /config/permissions`. The admin UI reads this before sign-in to
/// decide which screens to offer, so it is not session-gated.
pub async fn get_permissions(
    State(state): State<AppState>,
) -> Result<Json<PermissionMatrix>, AuthError> {
    // ---
    Ok(Json(state.permissions().permissions().await?))
}

/// `PUT /config/permissions`. Requires `manage-roles`.
pub async fn update_permissions(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(matrix): Json<PermissionMatrix>,
) -> Result<Json<PermissionsUpdated>, AuthError> {
    // ---
    let permissions = state
        .permissions()
        .update_permissions(&ctx.account, matrix)
        .await?;

    Ok(Json(PermissionsUpdated {
        success: true,
        permissions,
    }))
}
