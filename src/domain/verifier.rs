use super::account::Account;
use super::challenge::PendingChallenge;
use super::credential::{Credential, CredentialId, CredentialResponse};
use super::error::AuthError;
use std::sync::Arc;

/// Options for the client-side credential API plus the state needed to
/// verify the response later.
#[derive(Debug, Clone)]
pub struct IssuedChallenge {
    // ---
    /// JSON handed to `navigator.credentials.create()` / `.get()`.
    pub options: serde_json::Value,

    /// The challenge embedded in `options` (base64url).
    pub challenge: String,

    /// Opaque verifier state kept with the pending challenge.
    pub state: serde_json::Value,
}

/// Result of a verified attestation.
#[derive(Debug, Clone)]
pub struct RegisteredCredential {
    // ---
    pub id: CredentialId,
    pub public_key: Vec<u8>,
    pub counter: u32,
}

/// Result of a verified assertion. The counter has not been checked
/// against the stored value yet.
#[derive(Debug, Clone)]
pub struct VerifiedAssertion {
    // ---
    pub credential_id: CredentialId,
    pub counter: u32,

    /// Refreshed key material, when the verifier keeps state inside it.
    pub public_key: Option<Vec<u8>>,
}

/// Cryptographic half of the passkey ceremonies.
///
/// Implementations check challenge, origin, relying-party id hash and
/// signatures. Challenge lifetime, credential lookup and the counter rule
/// belong to the ceremony engine. Verification failures are reported as
/// [`AuthError::VerificationFailed`] (or [`AuthError::CounterReplay`] when
/// the backend detects a regressed counter itself).
pub trait CeremonyVerifier: Send + Sync {
    // ---
    fn start_registration(
        &self,
        account: &Account,
        exclude: &[CredentialId],
    ) -> Result<IssuedChallenge, AuthError>;

    fn finish_registration(
        &self,
        response: &CredentialResponse,
        pending: &PendingChallenge,
    ) -> Result<RegisteredCredential, AuthError>;

    fn start_authentication(&self, credentials: &[Credential]) -> Result<IssuedChallenge, AuthError>;

    fn finish_authentication(
        &self,
        response: &CredentialResponse,
        pending: &PendingChallenge,
        credential: &Credential,
    ) -> Result<VerifiedAssertion, AuthError>;
}

/// Type alias for any backend that implements CeremonyVerifier.
pub type VerifierPtr = Arc<dyn CeremonyVerifier>;
