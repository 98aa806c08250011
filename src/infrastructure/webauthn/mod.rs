//! WebAuthn configuration and the webauthn-rs ceremony verifier.
//!
//! The verifier owns the cryptography: option generation, attestation and
//! assertion checks (challenge, origin, rp-id hash, signature). Each
//! stored credential's `public_key` is the serialized webauthn-rs
//! `Passkey`, which is what the library needs to verify later assertions.

use std::str::FromStr;
use std::sync::Arc;

use crate::config::WebAuthnConfig;
use crate::domain::{
    Account, AuthError, CeremonyVerifier, Credential, CredentialId, CredentialResponse,
    IssuedChallenge, PendingChallenge, RegisteredCredential, VerifiedAssertion, VerifierPtr,
};
use anyhow::Result;
use reqwest::Url;
use serde::Serialize;
use webauthn_rs::prelude::{
    CredentialID, Passkey, PasskeyAuthentication, PasskeyRegistration, PublicKeyCredential,
    RegisterPublicKeyCredential, WebauthnError,
};
use webauthn_rs::{Webauthn, WebauthnBuilder};

/// Creates a configured WebAuthn instance from application config.
///
/// # Errors
/// Fails when the origin is not a URL or the RP ID is not a suffix of the
/// origin's host.
pub fn create_webauthn(config: &WebAuthnConfig) -> Result<Webauthn> {
    // ---
    tracing::debug!("Creating with config:{:?}", config);

    let url = Url::from_str(config.origin.as_str())?;
    let builder = WebauthnBuilder::new(&config.rp_id, &url)?;
    let webauthn = builder.rp_name(&config.rp_name).build()?;

    Ok(webauthn)
}

/// Builds the production verifier.
pub fn create_webauthn_verifier(config: &WebAuthnConfig) -> Result<VerifierPtr> {
    // ---
    let webauthn = create_webauthn(config)?;
    Ok(Arc::new(WebauthnVerifier::new(Arc::new(webauthn))))
}

pub struct WebauthnVerifier {
    // ---
    webauthn: Arc<Webauthn>,
}

impl WebauthnVerifier {
    // ---
    pub fn new(webauthn: Arc<Webauthn>) -> Self {
        // ---
        Self { webauthn }
    }
}

/// Serializes client options and pulls out the embedded challenge.
fn issue<O: Serialize, S: Serialize>(options: &O, state: &S) -> Result<IssuedChallenge, AuthError> {
    // ---
    let options = serde_json::to_value(options).map_err(AuthError::internal)?;
    let challenge = options
        .pointer("/publicKey/challenge")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AuthError::internal("options carry no challenge"))?
        .to_string();
    let state = serde_json::to_value(state).map_err(AuthError::internal)?;

    Ok(IssuedChallenge {
        options,
        challenge,
        state,
    })
}

fn parse_passkey(credential: &Credential) -> Option<Passkey> {
    // ---
    serde_json::from_slice(&credential.public_key)
        .map_err(|e| {
            tracing::error!(
                "Failed to deserialize passkey for credential {:?}: {}",
                credential.id,
                e
            );
        })
        .ok()
}

impl CeremonyVerifier for WebauthnVerifier {
    // ---
    fn start_registration(
        &self,
        account: &Account,
        exclude: &[CredentialId],
    ) -> Result<IssuedChallenge, AuthError> {
        // ---
        let exclude: Vec<CredentialID> = exclude
            .iter()
            .map(|id| CredentialID::from(id.as_bytes().to_vec()))
            .collect();
        let exclude = (!exclude.is_empty()).then_some(exclude);

        let display_name = match format!("{} {}", account.first_name, account.last_name).trim() {
            "" => account.username.clone(),
            name => name.to_string(),
        };

        let (options, state) = self
            .webauthn
            .start_passkey_registration(account.id, &account.username, &display_name, exclude)
            .map_err(|e| {
                tracing::error!("Failed to start registration: {}", e);
                AuthError::internal(e)
            })?;

        issue(&options, &state)
    }

    fn finish_registration(
        &self,
        response: &CredentialResponse,
        pending: &PendingChallenge,
    ) -> Result<RegisteredCredential, AuthError> {
        // ---
        let credential: RegisterPublicKeyCredential = serde_json::from_value(response.0.clone())
            .map_err(|e| {
                tracing::warn!("Malformed registration response: {}", e);
                AuthError::VerificationFailed
            })?;
        let state: PasskeyRegistration =
            serde_json::from_value(pending.state.clone()).map_err(AuthError::internal)?;

        let passkey = self
            .webauthn
            .finish_passkey_registration(&credential, &state)
            .map_err(|e| {
                tracing::warn!("Credential verification failed: {}", e);
                AuthError::VerificationFailed
            })?;

        let stored = serde_json::to_value(&passkey).map_err(AuthError::internal)?;
        // Authenticators may start above zero; replay checks begin from here.
        let counter = stored
            .pointer("/cred/counter")
            .and_then(serde_json::Value::as_u64)
            .and_then(|c| u32::try_from(c).ok())
            .unwrap_or(0);
        let public_key = serde_json::to_vec(&stored).map_err(AuthError::internal)?;

        Ok(RegisteredCredential {
            id: CredentialId::new(passkey.cred_id().to_vec()),
            public_key,
            counter,
        })
    }

    fn start_authentication(&self, credentials: &[Credential]) -> Result<IssuedChallenge, AuthError> {
        // ---
        let passkeys: Vec<Passkey> = credentials.iter().filter_map(parse_passkey).collect();

        if passkeys.is_empty() {
            return Err(AuthError::internal(
                "no stored credential could be loaded as a passkey",
            ));
        }

        let (options, state) = self
            .webauthn
            .start_passkey_authentication(&passkeys)
            .map_err(|e| {
                tracing::error!("Failed to generate auth challenge: {:?}", e);
                AuthError::internal(e)
            })?;

        issue(&options, &state)
    }

    fn finish_authentication(
        &self,
        response: &CredentialResponse,
        pending: &PendingChallenge,
        credential: &Credential,
    ) -> Result<VerifiedAssertion, AuthError> {
        // ---
        let assertion: PublicKeyCredential = serde_json::from_value(response.0.clone())
            .map_err(|e| {
                tracing::warn!("Malformed authentication response: {}", e);
                AuthError::VerificationFailed
            })?;
        let state: PasskeyAuthentication =
            serde_json::from_value(pending.state.clone()).map_err(AuthError::internal)?;

        let result = self
            .webauthn
            .finish_passkey_authentication(&assertion, &state)
            .map_err(|e| match e {
                WebauthnError::CredentialPossibleCompromise => AuthError::CounterReplay,
                other => {
                    tracing::warn!("Authentication verification failed: {:?}", other);
                    AuthError::VerificationFailed
                }
            })?;

        // Keep the stored passkey's internal counter and backup flags in step.
        let public_key = match parse_passkey(credential) {
            Some(mut passkey) => match passkey.update_credential(&result) {
                Some(true) => Some(serde_json::to_vec(&passkey).map_err(AuthError::internal)?),
                _ => None,
            },
            None => None,
        };

        Ok(VerifiedAssertion {
            credential_id: CredentialId::new(result.cred_id().to_vec()),
            counter: result.counter(),
            public_key,
        })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::domain::{Ceremony, NewAccount, Role};
    use std::time::Duration;

    fn test_config(origin: &str) -> WebAuthnConfig {
        // ---
        WebAuthnConfig {
            rp_id: "localhost".to_string(),
            rp_name: "Test App".to_string(),
            origin: origin.to_string(),
            challenge_ttl: Duration::from_secs(300),
        }
    }

    fn account() -> Account {
        // ---
        NewAccount {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "secret1".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            role: Role::Support,
            email_verified: true,
        }
        .into_account()
    }

    #[test]
    fn create_webauthn_success() {
        // ---
        assert!(create_webauthn(&test_config("http://localhost:8080")).is_ok());
    }

    #[test]
    fn create_webauthn_invalid_origin() {
        // ---
        assert!(create_webauthn(&test_config("not-a-valid-url")).is_err());
    }

    #[test]
    fn registration_options_expose_their_challenge() {
        // ---
        let verifier = create_webauthn_verifier(&test_config("http://localhost:3000")).unwrap();
        let issued = verifier.start_registration(&account(), &[]).unwrap();

        assert!(!issued.challenge.is_empty());
        assert_eq!(
            issued.options["publicKey"]["challenge"].as_str(),
            Some(issued.challenge.as_str())
        );
        assert_eq!(issued.options["publicKey"]["rp"]["id"], "localhost");
    }

    #[test]
    fn each_registration_gets_a_fresh_challenge() {
        // ---
        let verifier = create_webauthn_verifier(&test_config("http://localhost:3000")).unwrap();
        let a = verifier.start_registration(&account(), &[]).unwrap();
        let b = verifier.start_registration(&account(), &[]).unwrap();
        assert_ne!(a.challenge, b.challenge);
    }

    #[test]
    fn garbage_registration_response_fails_verification() {
        // ---
        let verifier = create_webauthn_verifier(&test_config("http://localhost:3000")).unwrap();
        let issued = verifier.start_registration(&account(), &[]).unwrap();
        let pending = PendingChallenge::new(Ceremony::Registration, issued.challenge, issued.state);

        let response = CredentialResponse(serde_json::json!({ "id": "AQID" }));
        assert!(matches!(
            verifier.finish_registration(&response, &pending),
            Err(AuthError::VerificationFailed)
        ));
    }

    #[test]
    fn authentication_needs_loadable_passkeys() {
        // ---
        let verifier = create_webauthn_verifier(&test_config("http://localhost:3000")).unwrap();
        let junk = Credential::new(CredentialId::new(vec![1]), b"not json".to_vec(), 0, vec![]);
        assert!(matches!(
            verifier.start_authentication(&[junk]),
            Err(AuthError::Internal(_))
        ));
    }
}
