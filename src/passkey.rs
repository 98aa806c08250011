//! Passkey registration and login ceremonies.
//!
//! Each account holds at most one outstanding challenge. `begin_*`
//! overwrites it; `complete_*` consumes it with a compare-and-clear before
//! any verification runs, so a challenge completes at most once and a
//! completion racing a newer `begin_*` finds nothing to consume. Once
//! consumed, the challenge stays cleared whatever happens next.
//!
//! Cryptographic checks are delegated to a [`CeremonyVerifier`] and run on
//! the blocking pool.

use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{
    counter_advances, Account, AuthError, AuthResult, Ceremony, ClientInfo, Credential,
    CredentialId, CredentialResponse, LastLogin, PendingChallenge, RepositoryPtr, VerifierPtr,
};
use crate::session::AuthContext;

/// Runs the passkey ceremonies against the repository.
pub struct PasskeyEngine {
    // ---
    repository: RepositoryPtr,
    verifier: VerifierPtr,
    challenge_ttl: Duration,
}

impl PasskeyEngine {
    // ---
    pub fn new(repository: RepositoryPtr, verifier: VerifierPtr, challenge_ttl: Duration) -> Self {
        // ---
        Self {
            repository,
            verifier,
            challenge_ttl,
        }
    }

    // ============================================================
    // Registration
    // ============================================================

    /// Issues registration options for the signed-in account. Credentials
    /// it already owns are excluded.
    pub async fn begin_registration(&self, ctx: &AuthContext) -> AuthResult<serde_json::Value> {
        // ---
        let account = self.load_account(ctx.account.id).await?;
        let exclude: Vec<CredentialId> = account
            .passkey_credentials
            .iter()
            .map(|c| c.id.clone())
            .collect();

        let issued = self.verifier.start_registration(&account, &exclude)?;
        let pending = PendingChallenge::new(Ceremony::Registration, issued.challenge, issued.state);
        self.repository.set_challenge(account.id, &pending).await?;

        tracing::info!("Registration challenge issued for user: {}", account.username);

        Ok(issued.options)
    }

    /// Verifies an attestation against the outstanding registration
    /// challenge and stores the new credential.
    pub async fn complete_registration(
        &self,
        ctx: &AuthContext,
        response: CredentialResponse,
    ) -> AuthResult<CredentialId> {
        // ---
        let account = self.load_account(ctx.account.id).await?;
        let pending = self
            .consume_challenge(&account, Ceremony::Registration)
            .await?;

        let verifier = self.verifier.clone();
        let transports = response.transports();
        let registered = tokio::task::spawn_blocking(move || {
            verifier.finish_registration(&response, &pending)
        })
        .await
        .map_err(AuthError::internal)?
        .map_err(|e| {
            tracing::warn!("Registration failed for user {}: {}", account.username, e);
            e
        })?;

        if let Some(owner) = self.repository.find_credential_owner(&registered.id).await? {
            tracing::warn!(
                "Credential {:?} already registered to account {}",
                registered.id,
                owner
            );
            return Err(AuthError::VerificationFailed);
        }

        let credential = Credential::new(
            registered.id.clone(),
            registered.public_key,
            registered.counter,
            transports,
        );
        if let Err(e) = self.repository.add_credential(account.id, &credential).await {
            // Lost a race with another registration of the same credential.
            if let Some(owner) = self.repository.find_credential_owner(&credential.id).await? {
                tracing::warn!(
                    "Credential {:?} registered concurrently to account {}",
                    credential.id,
                    owner
                );
                return Err(AuthError::VerificationFailed);
            }
            return Err(e.into());
        }

        tracing::info!(
            "Registration completed for user: {} (credential: {})",
            account.username,
            hex::encode(registered.id.as_bytes())
        );

        Ok(registered.id)
    }

    // ============================================================
    // Authentication
    // ============================================================

    /// Issues login options listing the account's credentials.
    pub async fn begin_authentication(&self, username: &str) -> AuthResult<serde_json::Value> {
        // ---
        let account = self
            .repository
            .get_account_by_username(username.trim())
            .await?
            .ok_or_else(|| {
                tracing::warn!("Passkey login requested for unknown user");
                AuthError::UnknownUser
            })?;

        if account.passkey_credentials.is_empty() {
            tracing::warn!("User '{}' has no registered passkeys", account.username);
            return Err(AuthError::NoCredentials);
        }

        let issued = self
            .verifier
            .start_authentication(&account.passkey_credentials)?;
        let pending =
            PendingChallenge::new(Ceremony::Authentication, issued.challenge, issued.state);
        self.repository.set_challenge(account.id, &pending).await?;

        tracing::debug!("Authentication challenge issued for user: {}", account.username);

        Ok(issued.options)
    }

    /// Verifies an assertion, enforces the signature counter rule, and
    /// records the login. Returns the account on success.
    pub async fn complete_authentication(
        &self,
        username: &str,
        response: CredentialResponse,
        client: &ClientInfo,
    ) -> AuthResult<Account> {
        // ---
        let mut account = self
            .repository
            .get_account_by_username(username.trim())
            .await?
            .ok_or(AuthError::UnknownUser)?;

        let outstanding = account
            .current_challenge
            .as_ref()
            .is_some_and(|p| p.ceremony == Ceremony::Authentication);
        if !outstanding {
            return Err(AuthError::NoChallenge);
        }

        // The challenge survives a lookup miss so the ceremony can be retried.
        let credential = response
            .credential_id()
            .and_then(|id| account.credential(&id).cloned())
            .ok_or_else(|| {
                tracing::warn!(
                    "Assertion for user '{}' names an unknown credential",
                    account.username
                );
                AuthError::CredentialNotFound
            })?;

        let pending = self
            .consume_challenge(&account, Ceremony::Authentication)
            .await?;

        let verifier = self.verifier.clone();
        let stored = credential.clone();
        let assertion = tokio::task::spawn_blocking(move || {
            verifier.finish_authentication(&response, &pending, &stored)
        })
        .await
        .map_err(AuthError::internal)?;

        let assertion = match assertion {
            Ok(assertion) => assertion,
            Err(AuthError::CounterReplay) => {
                log_counter_replay(&account, &credential, None);
                return Err(AuthError::CounterReplay);
            }
            Err(e) => {
                tracing::warn!("Passkey login failed for user '{}': {}", account.username, e);
                return Err(e);
            }
        };

        if assertion.credential_id != credential.id {
            tracing::warn!(
                "Verified credential {:?} differs from presented {:?}",
                assertion.credential_id,
                credential.id
            );
            return Err(AuthError::VerificationFailed);
        }

        if !counter_advances(credential.counter, assertion.counter) {
            log_counter_replay(&account, &credential, Some(assertion.counter));
            return Err(AuthError::CounterReplay);
        }

        let mut updated = credential;
        updated.counter = assertion.counter;
        if let Some(public_key) = assertion.public_key {
            updated.public_key = public_key;
        }
        self.repository.update_credential(account.id, &updated).await?;

        let login = LastLogin::from_client(client);
        self.repository.record_login(account.id, &login).await?;

        if let Some(slot) = account
            .passkey_credentials
            .iter_mut()
            .find(|c| c.id == updated.id)
        {
            *slot = updated;
        }
        account.current_challenge = None;
        account.last_login = Some(login);

        tracing::info!("Passkey login succeeded for user: {}", account.username);

        Ok(account)
    }

    // ============================================================
    // Credential management
    // ============================================================

    /// The signed-in account's credentials in registration order.
    pub async fn list_credentials(&self, ctx: &AuthContext) -> AuthResult<Vec<Credential>> {
        // ---
        Ok(self.repository.get_credentials(ctx.account.id).await?)
    }

    /// Removes one of the signed-in account's credentials.
    pub async fn delete_credential(
        &self,
        ctx: &AuthContext,
        credential_id: &CredentialId,
    ) -> AuthResult<()> {
        // ---
        let deleted = self
            .repository
            .delete_credential(ctx.account.id, credential_id)
            .await?;

        if !deleted {
            return Err(AuthError::CredentialNotFound);
        }

        tracing::info!(
            "Deleted credential {} for user: {}",
            hex::encode(credential_id.as_bytes()),
            ctx.account.username
        );
        Ok(())
    }

    // ============================================================
    // Helpers
    // ============================================================

    async fn load_account(&self, account_id: Uuid) -> AuthResult<Account> {
        // ---
        self.repository
            .get_account_by_id(account_id)
            .await?
            .ok_or(AuthError::AccountMissing)
    }

    /// Atomically takes the account's outstanding challenge for `ceremony`.
    ///
    /// A challenge for the other ceremony is left in place. An expired one
    /// is cleared. Both report [`AuthError::NoChallenge`].
    async fn consume_challenge(
        &self,
        account: &Account,
        ceremony: Ceremony,
    ) -> AuthResult<PendingChallenge> {
        // ---
        let pending = match &account.current_challenge {
            Some(pending) if pending.ceremony == ceremony => pending,
            _ => return Err(AuthError::NoChallenge),
        };

        if pending.is_expired(self.challenge_ttl, Utc::now()) {
            tracing::info!(
                "Expired {} challenge for user: {}",
                ceremony,
                account.username
            );
            self.repository
                .take_challenge(account.id, &pending.challenge)
                .await?;
            return Err(AuthError::NoChallenge);
        }

        self.repository
            .take_challenge(account.id, &pending.challenge)
            .await?
            .ok_or(AuthError::NoChallenge)
    }
}

fn log_counter_replay(account: &Account, credential: &Credential, presented: Option<u32>) {
    // ---
    tracing::error!(
        target: "security",
        user = %account.username,
        credential = %hex::encode(credential.id.as_bytes()),
        stored = credential.counter,
        presented = ?presented,
        "Signature counter did not advance; possible cloned authenticator"
    );
}
