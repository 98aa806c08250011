use crate::app_state::AppState;
use crate::domain::{AccountProfile, AuthError, Capability};
use crate::session::AuthContext;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::shared_types::{ApiResponse, ErrorResponse};

/// `GET /users/{username}`. Users may read their own profile; reading
/// anyone else's needs `manage-users`.
pub async fn get_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(username): Path<String>,
) -> Response {
    // ---
    if let Err(e) = state
        .permissions()
        .authorize_owner_or(&ctx.account, &username, Capability::ManageUsers)
        .await
    {
        return e.into_response();
    }

    match state.repository().get_account_by_username(&username).await {
        Ok(Some(account)) => ApiResponse::<AccountProfile> {
            data: account.profile(),
        }
        .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "User not found".to_string(),
            }),
        )
            .into_response(),
        Err(e) => AuthError::Storage(e).into_response(),
    }
}
