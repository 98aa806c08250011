//! Role-based permission checks.
//!
//! Every check reads the stored matrix afresh, so a matrix update applies
//! to the very next request.

use crate::domain::{
    Account, AuthError, AuthResult, Capability, PermissionMatrix, RepositoryPtr, RolePermissions,
};

pub struct PermissionEvaluator {
    // ---
    repository: RepositoryPtr,
}

impl PermissionEvaluator {
    // ---
    pub fn new(repository: RepositoryPtr) -> Self {
        // ---
        Self { repository }
    }

    /// The live matrix. Fails with [`AuthError::ConfigurationMissing`]
    /// when none has been stored.
    pub async fn permissions(&self) -> AuthResult<PermissionMatrix> {
        // ---
        self.repository
            .load_permissions()
            .await?
            .ok_or_else(|| {
                tracing::error!("Permission configuration missing");
                AuthError::ConfigurationMissing
            })
    }

    /// Allows the action iff the account's role holds `capability`.
    pub async fn authorize(&self, account: &Account, capability: Capability) -> AuthResult<()> {
        // ---
        let matrix = self.permissions().await?;

        if matrix.allows(account.role, capability) {
            return Ok(());
        }

        tracing::warn!(
            "User '{}' ({}) denied {}",
            account.username,
            account.role,
            capability
        );
        Err(AuthError::Forbidden)
    }

    /// Allows an account to act on itself; anyone else needs `capability`.
    pub async fn authorize_owner_or(
        &self,
        account: &Account,
        target_username: &str,
        capability: Capability,
    ) -> AuthResult<()> {
        // ---
        if account.username == target_username {
            return Ok(());
        }
        self.authorize(account, capability).await
    }

    /// Replaces the matrix. Requires `manage-roles`. The admin row always
    /// keeps every capability, whatever was submitted.
    pub async fn update_permissions(
        &self,
        actor: &Account,
        mut matrix: PermissionMatrix,
    ) -> AuthResult<PermissionMatrix> {
        // ---
        self.authorize(actor, Capability::ManageRoles).await?;

        if matrix.admin != RolePermissions::ALL {
            tracing::warn!(
                "Ignoring submitted admin permission changes from '{}'",
                actor.username
            );
            matrix.admin = RolePermissions::ALL;
        }

        self.repository.save_permissions(&matrix).await?;

        tracing::info!("Permission matrix updated by '{}'", actor.username);

        Ok(matrix)
    }
}
