//! Passkey ceremony and credential management handlers.
//!
//! Registration runs for the signed-in user:
//! 1. `register_options` - issue creation options and store the challenge
//! 2. `register_verify` - verify the attestation and store the credential
//!
//! Login is the same two-step shape keyed by username:
//! 1. `auth_options` - issue request options for the account's credentials
//! 2. `auth_verify` - verify the assertion, then start a session

use crate::app_state::AppState;
use crate::domain::{AuthError, ClientInfo, Credential, CredentialId, CredentialResponse};
use crate::session::AuthContext;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::auth::{start_session, SuccessResponse, UserResponse};
use super::shared_types::ErrorResponse;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct OptionsResponse {
    // ---
    pub success: bool,
    pub options: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct RegisterVerifyRequest {
    // ---
    pub credential: CredentialResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterVerifyResponse {
    // ---
    pub success: bool,
    pub credential_id: CredentialId,
}

#[derive(Debug, Deserialize)]
pub struct AuthOptionsRequest {
    // ---
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthVerifyRequest {
    // ---
    pub username: String,
    pub credential: CredentialResponse,
}

/// Client view of a stored credential. Key material stays server-side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSummary {
    // ---
    pub id: CredentialId,
    pub created_at: DateTime<Utc>,
    pub transports: Vec<String>,
    pub counter: u32,
}

impl From<Credential> for CredentialSummary {
    fn from(credential: Credential) -> Self {
        // ---
        Self {
            id: credential.id,
            created_at: credential.created_at,
            transports: credential.transports,
            counter: credential.counter,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CredentialListResponse {
    // ---
    pub success: bool,
    pub credentials: Vec<CredentialSummary>,
}

// ============================================================================
// Registration
// ============================================================================

/// `POST /auth/passkey/register-options`
pub async fn register_options(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<Json<OptionsResponse>, AuthError> {
    // ---
    let options = state.passkeys().begin_registration(&ctx).await?;

    Ok(Json(OptionsResponse {
        success: true,
        options,
    }))
}

/// `POST /auth/passkey/register-verify`
pub async fn register_verify(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(req): Json<RegisterVerifyRequest>,
) -> Result<Json<RegisterVerifyResponse>, AuthError> {
    // ---
    let credential_id = state
        .passkeys()
        .complete_registration(&ctx, req.credential)
        .await?;

    Ok(Json(RegisterVerifyResponse {
        success: true,
        credential_id,
    }))
}

// ============================================================================
// Authentication
// ============================================================================

/// `POST /auth/passkey/auth-options`
pub async fn auth_options(
    State(state): State<AppState>,
    Json(req): Json<AuthOptionsRequest>,
) -> Result<Json<OptionsResponse>, AuthError> {
    // ---
    let options = state.passkeys().begin_authentication(&req.username).await?;

    Ok(Json(OptionsResponse {
        success: true,
        options,
    }))
}

/// `POST /auth/passkey/auth-verify`
pub async fn auth_verify(
    State(state): State<AppState>,
    jar: CookieJar,
    client: ClientInfo,
    Json(req): Json<AuthVerifyRequest>,
) -> Result<(CookieJar, Json<UserResponse>), AuthError> {
    // ---
    let result = state
        .passkeys()
        .complete_authentication(&req.username, req.credential, &client)
        .await;

    state.metrics().record_login("passkey", result.is_ok());
    if matches!(result, Err(AuthError::CounterReplay)) {
        state.metrics().record_counter_replay();
    }
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

// ============================================================================
// Credential management
// ============================================================================

/// `GET /auth/passkey/credentials`
pub async fn list_credentials(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<Json<CredentialListResponse>, AuthError> {
    // ---
    let credentials = state.passkeys().list_credentials(&ctx).await?;

    Ok(Json(CredentialListResponse {
        success: true,
        credentials: credentials.into_iter().map(CredentialSummary::from).collect(),
    }))
}

/// `DELETE /auth/passkey/credentials/{id}`. `id` is the base64url
/// credential id; ids the user does not own answer 404.
pub async fn delete_credential(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<String>,
) -> Response {
    // ---
    let Some(credential_id) = CredentialId::from_base64url(&id) else {
        return credential_not_found();
    };

    match state.passkeys().delete_credential(&ctx, &credential_id).await {
        Ok(()) => Json(SuccessResponse { success: true }).into_response(),
        Err(AuthError::CredentialNotFound) => credential_not_found(),
        Err(e) => e.into_response(),
    }
}

fn credential_not_found() -> Response {
    // ---
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Credential not found".to_string(),
        }),
    )
        .into_response()
}
