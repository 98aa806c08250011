use super::account::{Account, LastLogin};
use super::challenge::PendingChallenge;
use super::credential::{Credential, CredentialId};
use super::permissions::PermissionMatrix;
use super::session::SessionRecord;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Abstraction for the credential store and the shared permission record.
///
/// Loaded accounts carry their passkeys (registration order) and their
/// outstanding challenge.
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    // ---
    /// Insert a new account with its password hash.
    async fn create_account(&self, account: &Account, password_hash: &str) -> Result<()>;

    /// Get account by ID.
    async fn get_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>>;

    /// Get account by exact username.
    async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>>;

    /// Get account by username, or by email compared case-insensitively.
    async fn get_account_by_identifier(&self, identifier: &str) -> Result<Option<Account>>;

    /// Get the stored password hash for an account.
    async fn get_password_hash(&self, account_id: Uuid) -> Result<Option<String>>;

    /// Delete an account along with its credentials.
    async fn delete_account(&self, account_id: Uuid) -> Result<()>;

    /// Overwrite the last-login record.
    async fn record_login(&self, account_id: Uuid, login: &LastLogin) -> Result<()>;

    /// Store the account's outstanding challenge, replacing any previous one.
    async fn set_challenge(&self, account_id: Uuid, challenge: &PendingChallenge) -> Result<()>;

    /// Atomically clear the outstanding challenge if it still equals
    /// `challenge`, returning the consumed record. Returns `None` when it
    /// was already cleared or superseded.
    async fn take_challenge(
        &self,
        account_id: Uuid,
        challenge: &str,
    ) -> Result<Option<PendingChallenge>>;

    /// Append a credential to the account.
    async fn add_credential(&self, account_id: Uuid, credential: &Credential) -> Result<()>;

    /// Get all credentials for an account, in registration order.
    async fn get_credentials(&self, account_id: Uuid) -> Result<Vec<Credential>>;

    /// Which account owns a credential id, system-wide.
    async fn find_credential_owner(&self, credential_id: &CredentialId) -> Result<Option<Uuid>>;

    /// Persist a credential's counter and key material.
    async fn update_credential(&self, account_id: Uuid, credential: &Credential) -> Result<()>;

    /// Delete one of the account's credentials. Returns whether it existed.
    async fn delete_credential(&self, account_id: Uuid, credential_id: &CredentialId)
        -> Result<bool>;

    /// Load the permission matrix record, if one has been stored.
    async fn load_permissions(&self) -> Result<Option<PermissionMatrix>>;

    /// Replace the permission matrix record.
    async fn save_permissions(&self, matrix: &PermissionMatrix) -> Result<()>;

    /// Round-trip to the backend. Used by `GET /health?mode=full`.
    async fn health_check(&self) -> Result<()> {
        // ---
        Ok(())
    }
}

/// Type alias for any backend that implements Repository.
pub type RepositoryPtr = Arc<dyn Repository>;

/// Externally persisted session storage, shared by every server instance.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    // ---
    /// Insert or replace a session. `ttl` lets the backend drop records
    /// that can no longer be valid.
    async fn put(&self, token: &str, record: &SessionRecord, ttl: Duration) -> Result<()>;

    async fn get(&self, token: &str) -> Result<Option<SessionRecord>>;

    /// Replace an existing session and reset its TTL. Never creates one:
    /// returns `false` when the token is no longer stored (for instance,
    /// removed by a concurrent logout).
    async fn touch(&self, token: &str, record: &SessionRecord, ttl: Duration) -> Result<bool>;

    /// Remove a session. Removing an unknown token is not an error.
    async fn remove(&self, token: &str) -> Result<()>;

    /// Round-trip to the backend. Used by `GET /health?mode=full`.
    async fn health_check(&self) -> Result<()> {
        // ---
        Ok(())
    }
}

/// Type alias for any backend that implements SessionStore.
pub type SessionStorePtr = Arc<dyn SessionStore>;
