use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Server-side session value, stored under an opaque token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    // ---
    pub account_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl SessionRecord {
    // ---
    pub fn new(account_id: Uuid, now: DateTime<Utc>) -> Self {
        // ---
        Self {
            account_id,
            created_at: now,
            last_activity: now,
        }
    }

    /// True once either the absolute or the idle lifetime is exceeded.
    pub fn is_expired(&self, now: DateTime<Utc>, absolute: Duration, idle: Duration) -> bool {
        // ---
        exceeds(now - self.created_at, absolute) || exceeds(now - self.last_activity, idle)
    }

    /// How long the record stays valid if left untouched from `now`.
    pub fn remaining(&self, now: DateTime<Utc>, absolute: Duration, idle: Duration) -> Duration {
        // ---
        let absolute_left = to_std(self.created_at, absolute, now);
        let idle_left = to_std(self.last_activity, idle, now);
        absolute_left.min(idle_left)
    }
}

fn exceeds(elapsed: chrono::Duration, limit: Duration) -> bool {
    // ---
    match elapsed.to_std() {
        Ok(elapsed) => elapsed > limit,
        // Negative elapsed time (clock skew between instances) is not expiry.
        Err(_) => false,
    }
}

fn to_std(start: DateTime<Utc>, limit: Duration, now: DateTime<Utc>) -> Duration {
    // ---
    let elapsed = (now - start).to_std().unwrap_or_default();
    limit.saturating_sub(elapsed)
}
