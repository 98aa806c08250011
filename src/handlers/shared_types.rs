use crate::domain::AuthError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Wrapper type for successful API responses.
///
/// Encapsulates the data payload and prepares it for JSON serialization.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> IntoResponse for ApiResponse<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        axum::Json(self).into_response()
    }
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    // ---
    pub error: String,
}

impl AuthError {
    // ---
    /// Status and client-facing message. Login failures share one message
    /// so callers cannot tell which check failed.
    pub(crate) fn status_and_message(&self) -> (StatusCode, &str) {
        // ---
        match self {
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid credentials"),
            AuthError::CredentialNotFound
            | AuthError::VerificationFailed
            | AuthError::CounterReplay
            | AuthError::UnknownUser
            | AuthError::NoCredentials => (StatusCode::UNAUTHORIZED, "Authentication failed"),
            AuthError::NoChallenge => (StatusCode::BAD_REQUEST, "No active challenge"),
            AuthError::NoSession | AuthError::AccountMissing => {
                (StatusCode::UNAUTHORIZED, "Not authenticated")
            }
            AuthError::Expired => (StatusCode::UNAUTHORIZED, "Session expired"),
            AuthError::Forbidden => (StatusCode::FORBIDDEN, "Insufficient permissions"),
            AuthError::ConfigurationMissing => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "System configuration not found",
            ),
            AuthError::AccountExists => (StatusCode::CONFLICT, "Account already exists"),
            AuthError::InvalidAccount(reason) => (StatusCode::BAD_REQUEST, reason.as_str()),
            AuthError::Storage(_) | AuthError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // ---
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        (
            status,
            Json(ErrorResponse {
                error: message.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn login_failures_are_indistinguishable_to_clients() {
        // ---
        let passkey_failures = [
            AuthError::CredentialNotFound,
            AuthError::VerificationFailed,
            AuthError::CounterReplay,
            AuthError::UnknownUser,
            AuthError::NoCredentials,
        ];
        for err in passkey_failures {
            assert_eq!(
                err.status_and_message(),
                (StatusCode::UNAUTHORIZED, "Authentication failed")
            );
        }
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        // ---
        let err = AuthError::Storage(anyhow::anyhow!("password=hunter2 connection refused"));
        assert_eq!(
            err.status_and_message(),
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        );
    }

    #[test]
    fn authorization_outcomes_are_distinct() {
        // ---
        assert_eq!(AuthError::Forbidden.status_and_message().0, StatusCode::FORBIDDEN);
        assert_eq!(AuthError::Expired.status_and_message().0, StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::ConfigurationMissing.status_and_message().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
