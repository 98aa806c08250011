//! PostgreSQL pool setup and schema bootstrap.
//!
//! The pool is created once per process and shared by every repository
//! handle. Startup retries the connection so the service can come up
//! before the database container is ready.

use anyhow::{anyhow, Result};
use once_cell::sync::OnceCell;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::DatabaseConfig;

static POOL: OnceCell<PgPool> = OnceCell::new();

const RETRY_DELAY: Duration = Duration::from_secs(1);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id              UUID PRIMARY KEY,
    username        TEXT NOT NULL UNIQUE,
    email           TEXT NOT NULL,
    password_hash   TEXT NOT NULL,
    first_name      TEXT NOT NULL DEFAULT '',
    last_name       TEXT NOT NULL DEFAULT '',
    role            TEXT NOT NULL,
    email_verified  BOOLEAN NOT NULL DEFAULT FALSE,
    created_at      TIMESTAMPTZ NOT NULL,
    last_login      JSONB,
    current_challenge JSONB
);

CREATE UNIQUE INDEX IF NOT EXISTS accounts_email_lower_idx ON accounts (LOWER(email));

CREATE TABLE IF NOT EXISTS passkey_credentials (
    seq         BIGSERIAL,
    id          BYTEA PRIMARY KEY,
    account_id  UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    public_key  BYTEA NOT NULL,
    counter     BIGINT NOT NULL,
    transports  TEXT[] NOT NULL DEFAULT '{}',
    created_at  TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS passkey_credentials_account_idx
    ON passkey_credentials (account_id, seq);

CREATE TABLE IF NOT EXISTS app_config (
    key         TEXT PRIMARY KEY,
    value       JSONB NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

/// Connects (with retry), applies the schema and stores the global pool.
/// Calling it again after success is a no-op.
pub async fn init_database_with_retry(config: &DatabaseConfig) -> Result<()> {
    // ---
    if POOL.get().is_some() {
        return Ok(());
    }

    let pool = connect_with_retry(config).await?;

    sqlx::raw_sql(SCHEMA).execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to apply database schema: {:?}", e);
        anyhow!("schema setup failed: {e}")
    })?;

    // A concurrent initializer may have won; its pool is equivalent.
    let _ = POOL.set(pool);

    tracing::info!("Database initialized");
    Ok(())
}

/// The process-wide pool. Fails if the database was never initialized.
pub fn get_pool() -> Result<PgPool> {
    // ---
    POOL.get()
        .cloned()
        .ok_or_else(|| anyhow!("database pool not initialized"))
}

async fn connect_with_retry(config: &DatabaseConfig) -> Result<PgPool> {
    // ---
    let attempts = config.retry_count.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        let result = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await;

        match result {
            Ok(pool) => {
                tracing::info!("Connected to PostgreSQL on attempt {}", attempt);
                return Ok(pool);
            }
            Err(e) => {
                tracing::warn!(
                    "PostgreSQL connection attempt {}/{} failed: {}",
                    attempt,
                    attempts,
                    e
                );
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    Err(anyhow!(
        "could not connect to PostgreSQL after {} attempts: {}",
        attempts,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
