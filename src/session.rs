//! Session management for authenticated users.
//!
//! Sessions live in an external [`SessionStore`](crate::domain::SessionStore)
//! under an opaque, high-entropy token. The token reaches the client only
//! inside an HTTP-only cookie (see `handlers`). Every request resolves the
//! token back to a freshly loaded account and slides the idle window.

use crate::domain::{Account, AuthError, AuthResult, RepositoryPtr, SessionRecord, SessionStorePtr};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

// ---

/// Session token entropy in bytes.
const TOKEN_BYTES: usize = 32;

// ---

/// The authenticated-request context produced by [`SessionManager::resolve`]
/// and passed explicitly to handlers.
#[derive(Clone)]
pub struct AuthContext {
    // ---
    /// The account as stored right now, not as it was at login.
    pub account: Account,
    pub session_token: String,
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("account", &self.account.username)
            .field("session_token", &"<redacted>")
            .finish()
    }
}

/// Creates, resolves and destroys server-side sessions.
pub struct SessionManager {
    // ---
    store: SessionStorePtr,
    repository: RepositoryPtr,
    absolute_timeout: Duration,
    idle_timeout: Duration,
}

impl SessionManager {
    // ---
    pub fn new(
        store: SessionStorePtr,
        repository: RepositoryPtr,
        absolute_timeout: Duration,
        idle_timeout: Duration,
    ) -> Self {
        // ---
        Self {
            store,
            repository,
            absolute_timeout,
            idle_timeout,
        }
    }

    /// Starts a session for the account and returns its token.
    pub async fn create(&self, account_id: Uuid) -> AuthResult<String> {
        // ---
        let token = generate_token();
        let record = SessionRecord::new(account_id, Utc::now());

        self.store
            .put(&token, &record, self.idle_timeout.min(self.absolute_timeout))
            .await?;

        tracing::info!("Created session for account: {}", account_id);

        Ok(token)
    }

    /// Resolves a token to its account, enforcing both timeouts.
    ///
    /// Expired sessions and sessions of deleted accounts are destroyed on
    /// detection. On success the idle window restarts.
    pub async fn resolve(&self, token: &str) -> AuthResult<AuthContext> {
        // ---
        if token.is_empty() {
            return Err(AuthError::NoSession);
        }

        let mut record = self.store.get(token).await?.ok_or(AuthError::NoSession)?;

        let now = Utc::now();
        if record.is_expired(now, self.absolute_timeout, self.idle_timeout) {
            tracing::info!("Session expired for account: {}", record.account_id);
            self.store.remove(token).await?;
            return Err(AuthError::Expired);
        }

        let account = match self.repository.get_account_by_id(record.account_id).await? {
            Some(account) => account,
            None => {
                tracing::warn!(
                    "Session references missing account: {}",
                    record.account_id
                );
                self.store.remove(token).await?;
                return Err(AuthError::AccountMissing);
            }
        };

        record.last_activity = now;
        let ttl = record.remaining(now, self.absolute_timeout, self.idle_timeout);
        if !self.store.touch(token, &record, ttl).await? {
            // Destroyed while this request was in flight.
            return Err(AuthError::NoSession);
        }

        Ok(AuthContext {
            account,
            session_token: token.to_string(),
        })
    }

    /// Ends a session. Unknown tokens are ignored.
    pub async fn destroy(&self, token: &str) -> AuthResult<()> {
        // ---
        if token.is_empty() {
            return Ok(());
        }
        self.store.remove(token).await?;
        Ok(())
    }
}

fn generate_token() -> String {
    // ---
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
