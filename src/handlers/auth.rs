//! Password login, logout and the current-user endpoint.

use crate::app_state::AppState;
use crate::domain::{AccountProfile, AuthError, AuthResult, ClientInfo};
use crate::session::AuthContext;
use axum::{extract::State, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::extract::{clear_session_cookie, session_cookie, session_token};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Password login body. `username` also accepts an email address.
#[derive(Deserialize)]
pub struct LoginRequest {
    // ---
    #[serde(alias = "identifier")]
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    // ---
    pub success: bool,
    pub user: AccountProfile,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    // ---
    pub success: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    client: ClientInfo,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<UserResponse>), AuthError> {
    // ---
    let result = state
        .passwords()
        .authenticate(&req.username, &req.password, &client)
        .await;
    state.metrics().record_login("password", result.is_ok());
    let account = result?;

    let jar = start_session(&state, jar, account.id).await?;

    Ok((
        jar,
        Json(UserResponse {
            success: true,
            user: account.profile(),
        }),
    ))
}

/// `POST /auth/logout`. Succeeds with or without a live session.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SuccessResponse>), AuthError> {
    // ---
    if let Some(token) = session_token(&jar, &state) {
        state.sessions().destroy(&token).await?;
        tracing::info!("Session ended by logout");
    }

    Ok((
        clear_session_cookie(jar, &state),
        Json(SuccessResponse { success: true }),
    ))
}

/// `GET /auth/me`
pub async fn me(ctx: AuthContext) -> Json<UserResponse> {
    // ---
    Json(UserResponse {
        success: true,
        user: ctx.account.profile(),
    })
}

/// Mints a fresh session for a just-authenticated account. A session the
/// client already held is destroyed first so its id is never reused.
pub(crate) async fn start_session(
    state: &AppState,
    jar: CookieJar,
    account_id: Uuid,
) -> AuthResult<CookieJar> {
    // ---
    if let Some(previous) = session_token(&jar, state) {
        state.sessions().destroy(&previous).await?;
    }

    let token = state.sessions().create(account_id).await?;
    Ok(jar.add(session_cookie(state, token)))
}
