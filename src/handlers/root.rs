use axum::response::IntoResponse;

pub async fn root_handler() -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        r#"Atlas AI auth service
Version: {version}

Available endpoints:
  - POST   /auth/login                       - Password login (sets session cookie)
  - POST   /auth/logout                      - End the current session
  - GET    /auth/me                          - Current user profile
  - POST   /auth/passkey/register-options    - Start passkey registration
  - POST   /auth/passkey/register-verify     - Finish passkey registration
  - POST   /auth/passkey/auth-options        - Start passkey login
  - POST   /auth/passkey/auth-verify         - Finish passkey login
  - GET    /auth/passkey/credentials         - List your passkeys
  - DELETE /auth/passkey/credentials/{{id}}    - Remove one of your passkeys
  - GET    /config/permissions               - Role permission matrix
  - PUT    /config/permissions               - Replace the matrix (manage-roles)
  - GET    /users/{{username}}                 - User profile (self or manage-users)
  - GET    /health                           - Light health check
  - GET    /health?mode=full                 - Full health check (database and sessions)
  - GET    /metrics                          - Prometheus metrics
"#
    )
}
