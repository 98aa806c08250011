//! Password login and account creation.
//!
//! Hashes are Argon2id PHC strings, so each stored hash carries its own
//! salt and cost parameters and older hashes keep verifying after the
//! configured cost changes. Hashing and verification run on the blocking
//! pool.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordVerifier, Version};
use tokio::sync::OnceCell;

use crate::domain::{Account, AuthError, AuthResult, ClientInfo, LastLogin, NewAccount, RepositoryPtr};

/// Verifies passwords against the repository and records successful logins.
pub struct PasswordAuth {
    // ---
    repository: RepositoryPtr,
    params: Params,

    /// Hash verified when the identifier matches no account, so unknown
    /// users cost as much as wrong passwords.
    dummy_hash: OnceCell<String>,
}

impl PasswordAuth {
    // ---
    pub fn new(repository: RepositoryPtr, params: Params) -> Self {
        // ---
        Self {
            repository,
            params,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Hashes a password with the configured cost and a fresh salt.
    pub async fn hash_password(&self, password: &str) -> AuthResult<String> {
        // ---
        let params = self.params.clone();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || hash_blocking(&password, params))
            .await
            .map_err(AuthError::internal)?
    }

    /// Logs in with a username or email plus password.
    ///
    /// Unknown identifiers and wrong passwords both yield
    /// [`AuthError::InvalidCredentials`]. On success the login is recorded
    /// and the returned account carries the new `last_login`.
    pub async fn authenticate(
        &self,
        identifier: &str,
        password: &str,
        client: &ClientInfo,
    ) -> AuthResult<Account> {
        // ---
        let identifier = identifier.trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let account = self.repository.get_account_by_identifier(identifier).await?;
        let stored_hash = match &account {
            Some(account) => self.repository.get_password_hash(account.id).await?,
            None => None,
        };

        let (hash, known) = match stored_hash {
            Some(hash) => (hash, true),
            None => (self.dummy_hash().await?, false),
        };

        let matches = verify(hash, password.to_string()).await?;

        let mut account = match account {
            Some(account) if known && matches => account,
            _ => {
                tracing::warn!("Password login failed");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let login = LastLogin::from_client(client);
        self.repository.record_login(account.id, &login).await?;
        account.last_login = Some(login);

        tracing::info!("Password login succeeded for user: {}", account.username);

        Ok(account)
    }

    /// Validates, hashes and stores a new account.
    pub async fn create_account(&self, input: NewAccount) -> AuthResult<Account> {
        // ---
        let input = input.normalized()?;

        let username_taken = self
            .repository
            .get_account_by_username(&input.username)
            .await?
            .is_some();
        let email_taken = self
            .repository
            .get_account_by_identifier(&input.email)
            .await?
            .is_some();
        if username_taken || email_taken {
            return Err(AuthError::AccountExists);
        }

        let hash = self.hash_password(&input.password).await?;
        let account = input.into_account();
        self.repository.create_account(&account, &hash).await?;

        tracing::info!(
            "Created account: {} (role: {})",
            account.username,
            account.role
        );

        Ok(account)
    }

    async fn dummy_hash(&self) -> AuthResult<String> {
        // ---
        self.dummy_hash
            .get_or_try_init(|| self.hash_password("atlas-dummy-password"))
            .await
            .cloned()
    }
}

fn hash_blocking(password: &str, params: Params) -> AuthResult<String> {
    // ---
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::internal(format!("Password hashing failed: {e}")))
}

async fn verify(hash: String, password: String) -> AuthResult<bool> {
    // ---
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash)
            .map_err(|e| AuthError::internal(format!("Invalid password hash format: {e}")))?;

        // Cost parameters come from the PHC string, not from `Argon2::default()`.
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::internal(format!(
                "Password verification failed: {e}"
            ))),
        }
    })
    .await
    .map_err(AuthError::internal)?
}
