use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::init::get_pool;
use crate::domain::{
    Account, Credential, CredentialId, LastLogin, PendingChallenge, PermissionMatrix, Repository,
    RepositoryPtr, Role,
};

const PERMISSIONS_KEY: &str = "permissions";

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    role: String,
    email_verified: bool,
    created_at: DateTime<Utc>,
    last_login: Option<Json<LastLogin>>,
    current_challenge: Option<Json<PendingChallenge>>,
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: Vec<u8>,
    public_key: Vec<u8>,
    counter: i64,
    transports: Vec<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CredentialRow> for Credential {
    // ---
    type Error = anyhow::Error;

    fn try_from(row: CredentialRow) -> Result<Self> {
        // ---
        let counter = u32::try_from(row.counter)
            .with_context(|| format!("stored counter {} out of range", row.counter))?;

        Ok(Credential {
            id: CredentialId::new(row.id),
            public_key: row.public_key,
            counter,
            transports: row.transports,
            created_at: row.created_at,
        })
    }
}

const ACCOUNT_COLUMNS: &str = "id, username, email, first_name, last_name, role, email_verified, \
                               created_at, last_login, current_challenge";

/// Creates a repository on the process-wide pool set up by
/// `init_database_with_retry`.
pub fn create_postgres_repository() -> Result<RepositoryPtr> {
    // ---
    let pool = get_pool()?;
    Ok(Arc::new(PostgresRepository::new(pool)))
}

pub struct PostgresRepository {
    // ---
    pool: PgPool,
}

impl PostgresRepository {
    // ---
    pub fn new(pool: PgPool) -> Self {
        // ---
        Self { pool }
    }

    async fn hydrate(&self, row: AccountRow) -> Result<Account> {
        // ---
        let passkey_credentials = self.get_credentials(row.id).await?;
        let role: Role = row.role.parse()?;

        Ok(Account {
            id: row.id,
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            role,
            email_verified: row.email_verified,
            created_at: row.created_at,
            last_login: row.last_login.map(|j| j.0),
            passkey_credentials,
            current_challenge: row.current_challenge.map(|j| j.0),
        })
    }

    async fn fetch_account(&self, filter: &str, bind: &str) -> Result<Option<Account>> {
        // ---
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE {filter}");
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(bind)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl Repository for PostgresRepository {
    // ---
    async fn create_account(&self, account: &Account, password_hash: &str) -> Result<()> {
        // ---
        sqlx::query(
            "INSERT INTO accounts (id, username, email, password_hash, first_name, last_name,
                                   role, email_verified, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(account.id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(account.role.as_str())
        .bind(account.email_verified)
        .bind(account.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>> {
        // ---
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        // ---
        self.fetch_account("username = $1", username).await
    }

    async fn get_account_by_identifier(&self, identifier: &str) -> Result<Option<Account>> {
        // ---
        self.fetch_account(
            "username = $1 OR LOWER(email) = LOWER($1) ORDER BY (username = $1) DESC LIMIT 1",
            identifier,
        )
        .await
    }

    async fn get_password_hash(&self, account_id: Uuid) -> Result<Option<String>> {
        // ---
        let hash = sqlx::query_scalar::<_, String>("SELECT password_hash FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(hash)
    }

    async fn delete_account(&self, account_id: Uuid) -> Result<()> {
        // ---
        sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(account_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn record_login(&self, account_id: Uuid, login: &LastLogin) -> Result<()> {
        // ---
        sqlx::query("UPDATE accounts SET last_login = $2 WHERE id = $1")
            .bind(account_id)
            .bind(Json(login))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_challenge(&self, account_id: Uuid, challenge: &PendingChallenge) -> Result<()> {
        // ---
        let result = sqlx::query("UPDATE accounts SET current_challenge = $2 WHERE id = $1")
            .bind(account_id)
            .bind(Json(challenge))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            bail!("account {} not found", account_id);
        }
        Ok(())
    }

    async fn take_challenge(
        &self,
        account_id: Uuid,
        challenge: &str,
    ) -> Result<Option<PendingChallenge>> {
        // ---
        // Row lock in the CTE serialises concurrent consumers; the loser
        // re-checks the predicate against the cleared value and gets nothing.
        let taken = sqlx::query_scalar::<_, Json<PendingChallenge>>(
            "WITH pending AS (
                 SELECT id, current_challenge FROM accounts
                 WHERE id = $1 AND current_challenge->>'challenge' = $2
                 FOR UPDATE
             )
             UPDATE accounts a SET current_challenge = NULL
             FROM pending
             WHERE a.id = pending.id
             RETURNING pending.current_challenge",
        )
        .bind(account_id)
        .bind(challenge)
        .fetch_optional(&self.pool)
        .await?;

        Ok(taken.map(|j| j.0))
    }

    async fn add_credential(&self, account_id: Uuid, credential: &Credential) -> Result<()> {
        // ---
        sqlx::query(
            "INSERT INTO passkey_credentials (id, account_id, public_key, counter, transports, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(credential.id.as_bytes())
        .bind(account_id)
        .bind(&credential.public_key)
        .bind(i64::from(credential.counter))
        .bind(&credential.transports)
        .bind(credential.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_credentials(&self, account_id: Uuid) -> Result<Vec<Credential>> {
        // ---
        let rows = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, public_key, counter, transports, created_at
             FROM passkey_credentials WHERE account_id = $1 ORDER BY seq",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Credential::try_from).collect()
    }

    async fn find_credential_owner(&self, credential_id: &CredentialId) -> Result<Option<Uuid>> {
        // ---
        let owner = sqlx::query_scalar::<_, Uuid>(
            "SELECT account_id FROM passkey_credentials WHERE id = $1",
        )
        .bind(credential_id.as_bytes())
        .fetch_optional(&self.pool)
        .await?;

        Ok(owner)
    }

    async fn update_credential(&self, account_id: Uuid, credential: &Credential) -> Result<()> {
        // ---
        let result = sqlx::query(
            "UPDATE passkey_credentials SET public_key = $3, counter = $4
             WHERE account_id = $1 AND id = $2",
        )
        .bind(account_id)
        .bind(credential.id.as_bytes())
        .bind(&credential.public_key)
        .bind(i64::from(credential.counter))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("credential {:?} not found", credential.id);
        }
        Ok(())
    }

    async fn delete_credential(
        &self,
        account_id: Uuid,
        credential_id: &CredentialId,
    ) -> Result<bool> {
        // ---
        let result =
            sqlx::query("DELETE FROM passkey_credentials WHERE account_id = $1 AND id = $2")
                .bind(account_id)
                .bind(credential_id.as_bytes())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn load_permissions(&self) -> Result<Option<PermissionMatrix>> {
        // ---
        let value = sqlx::query_scalar::<_, Json<PermissionMatrix>>(
            "SELECT value FROM app_config WHERE key = $1",
        )
        .bind(PERMISSIONS_KEY)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value.map(|j| j.0))
    }

    async fn save_permissions(&self, matrix: &PermissionMatrix) -> Result<()> {
        // ---
        sqlx::query(
            "INSERT INTO app_config (key, value, updated_at) VALUES ($1, $2, NOW())
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
        )
        .bind(PERMISSIONS_KEY)
        .bind(Json(matrix))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        // ---
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
