use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which passkey ceremony a challenge was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ceremony {
    // ---
    Registration,
    Authentication,
}

impl Ceremony {
    // ---
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            Ceremony::Registration => "registration",
            Ceremony::Authentication => "authentication",
        }
    }
}

impl fmt::Display for Ceremony {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Ceremony {
    // ---
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s {
            "registration" => Ok(Ceremony::Registration),
            "authentication" => Ok(Ceremony::Authentication),
            other => Err(anyhow::anyhow!("unknown ceremony '{other}'")),
        }
    }
}

/// The single outstanding challenge stored on an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChallenge {
    // ---
    pub ceremony: Ceremony,

    /// The challenge as sent to the client (base64url).
    pub challenge: String,

    /// Verifier-specific ceremony state needed to finish verification.
    pub state: serde_json::Value,

    pub issued_at: DateTime<Utc>,
}

impl PendingChallenge {
    // ---
    pub fn new(ceremony: Ceremony, challenge: String, state: serde_json::Value) -> Self {
        // ---
        Self {
            ceremony,
            challenge,
            state,
            issued_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        // ---
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now - self.issued_at > ttl,
            Err(_) => false,
        }
    }
}
