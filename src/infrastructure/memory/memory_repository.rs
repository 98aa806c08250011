use anyhow::{bail, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    Account, Credential, CredentialId, LastLogin, PendingChallenge, PermissionMatrix, Repository,
    Role,
};

pub fn create_memory_repository() -> MemoryRepository {
    // ---
    MemoryRepository::new()
}

#[derive(Default)]
struct Inner {
    // ---
    accounts: HashMap<Uuid, Account>,
    password_hashes: HashMap<Uuid, String>,
    permissions: Option<PermissionMatrix>,
}

impl Inner {
    // ---
    fn account_mut(&mut self, account_id: Uuid) -> Result<&mut Account> {
        // ---
        match self.accounts.get_mut(&account_id) {
            Some(account) => Ok(account),
            None => bail!("account {} not found", account_id),
        }
    }
}

/// Single-process repository. One lock guards every record, so each
/// method is atomic with respect to the others.
#[derive(Default)]
pub struct MemoryRepository {
    // ---
    inner: RwLock<Inner>,
}

impl MemoryRepository {
    // ---
    pub fn new() -> Self {
        // ---
        Self::default()
    }

    /// Changes an account's role in place (administrative edit).
    pub async fn set_role(&self, account_id: Uuid, role: Role) -> Result<()> {
        // ---
        let mut inner = self.inner.write().await;
        inner.account_mut(account_id)?.role = role;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Repository for MemoryRepository {
    // ---
    async fn create_account(&self, account: &Account, password_hash: &str) -> Result<()> {
        // ---
        let mut inner = self.inner.write().await;

        let email = account.email.to_lowercase();
        let taken = inner
            .accounts
            .values()
            .any(|a| a.username == account.username || a.email.to_lowercase() == email);
        if taken {
            bail!("duplicate username or email: {}", account.username);
        }

        inner.accounts.insert(account.id, account.clone());
        inner
            .password_hashes
            .insert(account.id, password_hash.to_string());
        Ok(())
    }

    async fn get_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>> {
        // ---
        Ok(self.inner.read().await.accounts.get(&account_id).cloned())
    }

    async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        // ---
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn get_account_by_identifier(&self, identifier: &str) -> Result<Option<Account>> {
        // ---
        let inner = self.inner.read().await;
        let email = identifier.to_lowercase();
        Ok(inner
            .accounts
            .values()
            .find(|a| a.username == identifier || a.email.to_lowercase() == email)
            .cloned())
    }

    async fn get_password_hash(&self, account_id: Uuid) -> Result<Option<String>> {
        // ---
        Ok(self
            .inner
            .read()
            .await
            .password_hashes
            .get(&account_id)
            .cloned())
    }

    async fn delete_account(&self, account_id: Uuid) -> Result<()> {
        // ---
        let mut inner = self.inner.write().await;
        inner.accounts.remove(&account_id);
        inner.password_hashes.remove(&account_id);
        Ok(())
    }

    async fn record_login(&self, account_id: Uuid, login: &LastLogin) -> Result<()> {
        // ---
        let mut inner = self.inner.write().await;
        inner.account_mut(account_id)?.last_login = Some(login.clone());
        Ok(())
    }

    async fn set_challenge(&self, account_id: Uuid, challenge: &PendingChallenge) -> Result<()> {
        // ---
        let mut inner = self.inner.write().await;
        inner.account_mut(account_id)?.current_challenge = Some(challenge.clone());
        Ok(())
    }

    async fn take_challenge(
        &self,
        account_id: Uuid,
        challenge: &str,
    ) -> Result<Option<PendingChallenge>> {
        // ---
        let mut inner = self.inner.write().await;
        let account = inner.account_mut(account_id)?;

        let matches = account
            .current_challenge
            .as_ref()
            .is_some_and(|pending| pending.challenge == challenge);

        Ok(if matches {
            account.current_challenge.take()
        } else {
            None
        })
    }

    async fn add_credential(&self, account_id: Uuid, credential: &Credential) -> Result<()> {
        // ---
        let mut inner = self.inner.write().await;

        let duplicate = inner
            .accounts
            .values()
            .flat_map(|a| a.passkey_credentials.iter())
            .any(|c| c.id == credential.id);
        if duplicate {
            bail!("credential {:?} already registered", credential.id);
        }

        inner
            .account_mut(account_id)?
            .passkey_credentials
            .push(credential.clone());
        Ok(())
    }

    async fn get_credentials(&self, account_id: Uuid) -> Result<Vec<Credential>> {
        // ---
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .get(&account_id)
            .map(|a| a.passkey_credentials.clone())
            .unwrap_or_default())
    }

    async fn find_credential_owner(&self, credential_id: &CredentialId) -> Result<Option<Uuid>> {
        // ---
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .values()
            .find(|a| a.credential(credential_id).is_some())
            .map(|a| a.id))
    }

    async fn update_credential(&self, account_id: Uuid, credential: &Credential) -> Result<()> {
        // ---
        let mut inner = self.inner.write().await;
        let account = inner.account_mut(account_id)?;

        match account
            .passkey_credentials
            .iter_mut()
            .find(|c| c.id == credential.id)
        {
            Some(stored) => {
                stored.counter = credential.counter;
                stored.public_key = credential.public_key.clone();
                Ok(())
            }
            None => bail!("credential {:?} not found", credential.id),
        }
    }

    async fn delete_credential(
        &self,
        account_id: Uuid,
        credential_id: &CredentialId,
    ) -> Result<bool> {
        // ---
        let mut inner = self.inner.write().await;
        let Some(account) = inner.accounts.get_mut(&account_id) else {
            return Ok(false);
        };

        let before = account.passkey_credentials.len();
        account.passkey_credentials.retain(|c| &c.id != credential_id);
        Ok(account.passkey_credentials.len() != before)
    }

    async fn load_permissions(&self) -> Result<Option<PermissionMatrix>> {
        // ---
        Ok(self.inner.read().await.permissions)
    }

    async fn save_permissions(&self, matrix: &PermissionMatrix) -> Result<()> {
        // ---
        self.inner.write().await.permissions = Some(*matrix);
        Ok(())
    }
}
