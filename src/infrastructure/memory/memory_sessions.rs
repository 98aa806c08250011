use anyhow::Result;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::{SessionRecord, SessionStore};

pub fn create_memory_session_store() -> MemorySessionStore {
    // ---
    MemorySessionStore::new()
}

/// Process-local session store. Entries past their TTL are treated as
/// absent and dropped lazily.
#[derive(Default)]
pub struct MemorySessionStore {
    // ---
    entries: Mutex<HashMap<String, (SessionRecord, Instant)>>,
}

impl MemorySessionStore {
    // ---
    pub fn new() -> Self {
        // ---
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    // ---
    async fn put(&self, token: &str, record: &SessionRecord, ttl: Duration) -> Result<()> {
        // ---
        let deadline = Instant::now() + ttl;
        self.entries
            .lock()
            .await
            .insert(token.to_string(), (record.clone(), deadline));
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<SessionRecord>> {
        // ---
        let mut entries = self.entries.lock().await;

        match entries.get(token) {
            Some((_, deadline)) if *deadline <= Instant::now() => {
                entries.remove(token);
                Ok(None)
            }
            Some((record, _)) => Ok(Some(record.clone())),
            None => Ok(None),
        }
    }

    async fn touch(&self, token: &str, record: &SessionRecord, ttl: Duration) -> Result<bool> {
        // ---
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        match entries.get_mut(token) {
            Some((_, deadline)) if *deadline <= now => {
                entries.remove(token);
                Ok(false)
            }
            Some(entry) => {
                *entry = (record.clone(), now + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, token: &str) -> Result<()> {
        // ---
        self.entries.lock().await.remove(token);
        Ok(())
    }
}
