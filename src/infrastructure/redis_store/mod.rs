//! Redis-backed session storage.
//!
//! Each session is one JSON value under `session:{token}`, written with
//! `SET EX` so Redis drops sessions that can no longer be valid. Refreshes
//! use `SET XX EX`, which only overwrites a key that still exists.

use anyhow::{Context, Result};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{SessionRecord, SessionStore, SessionStorePtr};

pub fn create_redis_session_store(url: &str) -> Result<SessionStorePtr> {
    // ---
    let client = Client::open(url).context("invalid Redis URL")?;
    Ok(Arc::new(RedisSessionStore::new(client)))
}

pub struct RedisSessionStore {
    // ---
    client: Client,
}

impl RedisSessionStore {
    // ---
    pub fn new(client: Client) -> Self {
        // ---
        Self { client }
    }

    async fn conn(&self) -> Result<MultiplexedConnection> {
        // ---
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| {
                tracing::error!("Failed to connect to Redis: {:?}", err);
                err.into()
            })
    }
}

fn session_key(token: &str) -> String {
    // ---
    format!("session:{token}")
}

#[async_trait::async_trait]
impl SessionStore for RedisSessionStore {
    // ---
    async fn put(&self, token: &str, record: &SessionRecord, ttl: Duration) -> Result<()> {
        // ---
        let mut conn = self.conn().await?;
        let key = session_key(token);

        // Redis rejects a zero expiry; a record with no time left is gone.
        let seconds = ttl.as_secs();
        if seconds == 0 {
            conn.del::<_, ()>(&key).await?;
            return Ok(());
        }

        let json = serde_json::to_string(record)?;
        conn.set_ex::<_, _, ()>(&key, json, seconds)
            .await
            .map_err(|e| {
                tracing::error!("Failed to store session in Redis: {}", e);
                e
            })?;

        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<SessionRecord>> {
        // ---
        let mut conn = self.conn().await?;
        let json: Option<String> = conn.get(session_key(token)).await?;

        match json {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).context("corrupt session record")?,
            )),
            None => Ok(None),
        }
    }

    async fn touch(&self, token: &str, record: &SessionRecord, ttl: Duration) -> Result<bool> {
        // ---
        let mut conn = self.conn().await?;
        let key = session_key(token);

        let seconds = ttl.as_secs();
        if seconds == 0 {
            conn.del::<_, ()>(&key).await?;
            return Ok(false);
        }

        let json = serde_json::to_string(record)?;
        // Nil reply: the key is gone and stays gone.
        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(json)
            .arg("XX")
            .arg("EX")
            .arg(seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                tracing::error!("Failed to refresh session in Redis: {}", e);
                e
            })?;

        Ok(reply.is_some())
    }

    async fn remove(&self, token: &str) -> Result<()> {
        // ---
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(session_key(token)).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        // ---
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
