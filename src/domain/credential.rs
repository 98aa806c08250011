use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Opaque authenticator-assigned credential identifier.
///
/// The canonical text form is unpadded base64url, both on the wire and in
/// logs that need a printable id. Storage compares raw bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CredentialId(Vec<u8>);

impl CredentialId {
    // ---
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        // ---
        Self(bytes.into())
    }

    /// Decodes the canonical base64url form. Trailing padding is tolerated
    /// since some clients still emit it.
    pub fn from_base64url(encoded: &str) -> Option<Self> {
        // ---
        URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .ok()
            .filter(|bytes| !bytes.is_empty())
            .map(Self)
    }

    pub fn to_base64url(&self) -> String {
        // ---
        URL_SAFE_NO_PAD.encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        // ---
        &self.0
    }
}

impl fmt::Debug for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialId({})", hex::encode(&self.0))
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64url())
    }
}

impl Serialize for CredentialId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64url())
    }
}

impl<'de> Deserialize<'de> for CredentialId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        CredentialId::from_base64url(&encoded)
            .ok_or_else(|| serde::de::Error::custom("credential id is not base64url"))
    }
}

/// A registered passkey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    // ---
    pub id: CredentialId,

    /// Verification key material. Opaque to the core; the ceremony
    /// verifier decides its encoding.
    pub public_key: Vec<u8>,

    /// Last signature counter accepted for this authenticator.
    pub counter: u32,

    /// Advisory transport hints ("internal", "usb", ...).
    pub transports: Vec<String>,

    pub created_at: DateTime<Utc>,
}

impl Credential {
    // ---
    pub fn new(id: CredentialId, public_key: Vec<u8>, counter: u32, transports: Vec<String>) -> Self {
        // ---
        Self {
            id,
            public_key,
            counter,
            transports,
            created_at: Utc::now(),
        }
    }
}

/// Anti-cloning rule: the counter must strictly increase, except for
/// authenticators that never implement one and report 0 both times.
pub fn counter_advances(stored: u32, presented: u32) -> bool {
    // ---
    presented > stored || (stored == 0 && presented == 0)
}

/// A client-side credential API response (registration or
/// authentication), kept as JSON so it reaches the verifier untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialResponse(pub serde_json::Value);

impl CredentialResponse {
    // ---
    /// The credential id the client claims to use, read from `rawId`
    /// (falling back to `id`).
    pub fn credential_id(&self) -> Option<CredentialId> {
        // ---
        ["rawId", "id"]
            .iter()
            .filter_map(|key| self.0.get(key).and_then(|v| v.as_str()))
            .find_map(CredentialId::from_base64url)
    }

    /// Transport hints reported with a registration response.
    pub fn transports(&self) -> Vec<String> {
        // ---
        self.0
            .pointer("/response/transports")
            .or_else(|| self.0.get("transports"))
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
