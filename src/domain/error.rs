//! Error taxonomy for the authentication and authorization core.
//!
//! Every core operation returns `Result<T, AuthError>`. The variants
//! distinguish failure kinds for logging and for the HTTP boundary, which
//! decides how much of the distinction reaches the client.

use thiserror::Error;

/// Failure kinds produced by password login, passkey ceremonies, session
/// resolution and permission checks.
#[derive(Debug, Error)]
pub enum AuthError {
    // ---
    /// Unknown identifier or wrong password. Never says which.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account has no outstanding challenge for this ceremony.
    #[error("no outstanding challenge")]
    NoChallenge,

    /// The assertion names a credential the account does not own.
    #[error("credential not found")]
    CredentialNotFound,

    /// Attestation or assertion did not verify (challenge, origin, rp-id,
    /// signature).
    #[error("verification failed")]
    VerificationFailed,

    /// The signature counter did not advance: possible cloned authenticator.
    #[error("signature counter replay")]
    CounterReplay,

    /// No account matches the username.
    #[error("unknown user")]
    UnknownUser,

    /// The account has no registered passkeys.
    #[error("no registered credentials")]
    NoCredentials,

    /// No session token, or the token is unknown.
    #[error("no session")]
    NoSession,

    /// The session exceeded its idle or absolute lifetime.
    #[error("session expired")]
    Expired,

    /// The session references an account that no longer exists.
    #[error("account missing")]
    AccountMissing,

    /// The account's role lacks the capability.
    #[error("forbidden")]
    Forbidden,

    /// The permission matrix record is absent.
    #[error("permission configuration missing")]
    ConfigurationMissing,

    /// Username or email already taken.
    #[error("account already exists")]
    AccountExists,

    /// Account fields failed validation.
    #[error("invalid account: {0}")]
    InvalidAccount(String),

    /// Backend failure (database, Redis).
    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    // ---
    /// Creates an [`AuthError::Internal`] from any displayable value.
    pub fn internal(msg: impl std::fmt::Display) -> Self {
        // ---
        AuthError::Internal(msg.to_string())
    }

    /// True for failures of a login ceremony that must look identical to
    /// the client.
    pub fn is_login_failure(&self) -> bool {
        // ---
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::CredentialNotFound
                | AuthError::VerificationFailed
                | AuthError::CounterReplay
                | AuthError::UnknownUser
                | AuthError::NoCredentials
        )
    }
}

/// Convenience alias used across the core services.
pub type AuthResult<T> = Result<T, AuthError>;
