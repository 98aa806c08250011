//! First-start seeding.
//!
//! Writes the default permission matrix when none is stored, and creates
//! the initial admin account when `ATLAS_ADMIN_PASSWORD` is set and the
//! account does not exist yet. Both steps leave existing data untouched.

use crate::config::BootstrapConfig;
use crate::domain::{AuthError, AuthResult, NewAccount, PermissionMatrix, RepositoryPtr, Role};
use crate::password::PasswordAuth;

/// Stores the default matrix if the record is absent. Returns whether it
/// wrote anything.
pub async fn seed_permissions(repository: &RepositoryPtr) -> AuthResult<bool> {
    // ---
    if repository.load_permissions().await?.is_some() {
        return Ok(false);
    }

    repository.save_permissions(&PermissionMatrix::seed()).await?;
    tracing::info!("Seeded default permission matrix");
    Ok(true)
}

/// Creates the configured admin account if needed. Returns whether an
/// account was created.
pub async fn seed_admin(
    password_auth: &PasswordAuth,
    repository: &RepositoryPtr,
    config: &BootstrapConfig,
) -> AuthResult<bool> {
    // ---
    let Some(password) = config.admin_password.as_deref() else {
        return Ok(false);
    };

    if repository
        .get_account_by_username(&config.admin_username)
        .await?
        .is_some()
    {
        return Ok(false);
    }

    let input = NewAccount {
        username: config.admin_username.clone(),
        email: config.admin_email.clone(),
        password: password.to_string(),
        first_name: "Admin".to_string(),
        last_name: String::new(),
        role: Role::Admin,
        email_verified: true,
    };

    match password_auth.create_account(input).await {
        Ok(account) => {
            tracing::info!("Seeded admin account: {}", account.username);
            Ok(true)
        }
        // Email taken by another account; leave it alone.
        Err(AuthError::AccountExists) => {
            tracing::warn!(
                "Admin seeding skipped: email {} already in use",
                config.admin_email
            );
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::domain::{Capability, RepositoryPtr};
    use crate::infrastructure::MemoryRepository;
    use argon2::Params;
    use std::sync::Arc;

    fn setup() -> (RepositoryPtr, PasswordAuth) {
        // ---
        let repository: RepositoryPtr = Arc::new(MemoryRepository::new());
        let params = Params::new(1024, 1, 1, None).unwrap();
        let auth = PasswordAuth::new(repository.clone(), params);
        (repository, auth)
    }

    fn config(password: Option<&str>) -> BootstrapConfig {
        // ---
        BootstrapConfig {
            admin_username: "admin".to_string(),
            admin_email: "admin@atlas.local".to_string(),
            admin_password: password.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn permissions_seeded_once() {
        // ---
        let (repository, _) = setup();
        assert!(seed_permissions(&repository).await.unwrap());

        let mut custom = PermissionMatrix::seed();
        custom.client = custom.client.with(Capability::ViewDashboard, true);
        repository.save_permissions(&custom).await.unwrap();

        assert!(!seed_permissions(&repository).await.unwrap());
        assert_eq!(repository.load_permissions().await.unwrap(), Some(custom));
    }

    #[tokio::test]
    async fn admin_seeded_only_with_password() {
        // ---
        let (repository, auth) = setup();

        assert!(!seed_admin(&auth, &repository, &config(None)).await.unwrap());
        assert!(repository
            .get_account_by_username("admin")
            .await
            .unwrap()
            .is_none());

        assert!(seed_admin(&auth, &repository, &config(Some("changeme")))
            .await
            .unwrap());
        let admin = repository
            .get_account_by_username("admin")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, Role::Admin);

        // Second start is a no-op.
        assert!(!seed_admin(&auth, &repository, &config(Some("changeme")))
            .await
            .unwrap());
    }
}
