//! Application state management.
//!
//! `AppState` is the dependency-injection container handed to every axum
//! handler through the `State` extractor. It is built once at startup and
//! cloned per request; everything heavy sits behind an `Arc`.

use crate::config::{AppConfig, PasswordConfig, SessionConfig};
use crate::domain::{MetricsPtr, RepositoryPtr, SessionStorePtr, VerifierPtr};
use crate::passkey::PasskeyEngine;
use crate::password::PasswordAuth;
use crate::permissions::PermissionEvaluator;
use crate::session::SessionManager;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// The authentication settings `AppState` needs, separated from the
/// deployment settings (store type, URLs) in [`AppConfig`].
#[derive(Debug, Clone)]
pub struct AuthSettings {
    // ---
    pub session: SessionConfig,
    pub password: PasswordConfig,
    pub challenge_ttl: Duration,
}

impl AuthSettings {
    // ---
    pub fn from_config(config: &AppConfig) -> Self {
        // ---
        Self {
            session: config.session.clone(),
            password: config.password.clone(),
            challenge_ttl: config.webauthn.challenge_ttl,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        // ---
        Self {
            session: SessionConfig::default(),
            password: PasswordConfig::default(),
            challenge_ttl: Duration::from_secs(300),
        }
    }
}

/// Shared application state passed to all axum handlers.
///
/// Handlers depend on the core services, never on concrete backends:
/// the repository, session store and ceremony verifier arrive as trait
/// objects.
#[derive(Clone)]
pub struct AppState {
    // ---
    /// Prometheus-backed or no-op, chosen by `ATLAS_METRICS_TYPE`.
    metrics: MetricsPtr,

    /// Used directly only by the health check; everything else goes
    /// through the services below.
    repository: RepositoryPtr,
    session_store: SessionStorePtr,

    sessions: Arc<SessionManager>,
    passwords: Arc<PasswordAuth>,
    passkeys: Arc<PasskeyEngine>,
    permissions: Arc<PermissionEvaluator>,

    cookie_name: Arc<str>,
    cookie_secure: bool,
}

impl AppState {
    // ---
    /// Wires the core services onto the given backends.
    ///
    /// # Errors
    /// Fails if the password hashing parameters are invalid.
    pub fn new(
        repository: RepositoryPtr,
        session_store: SessionStorePtr,
        verifier: VerifierPtr,
        metrics: MetricsPtr,
        settings: AuthSettings,
    ) -> Result<Self> {
        // ---
        let sessions = SessionManager::new(
            session_store.clone(),
            repository.clone(),
            settings.session.absolute_timeout,
            settings.session.idle_timeout,
        );
        let passwords = PasswordAuth::new(repository.clone(), settings.password.params()?);
        let passkeys = PasskeyEngine::new(repository.clone(), verifier, settings.challenge_ttl);
        let permissions = PermissionEvaluator::new(repository.clone());

        Ok(AppState {
            metrics,
            repository,
            session_store,
            sessions: Arc::new(sessions),
            passwords: Arc::new(passwords),
            passkeys: Arc::new(passkeys),
            permissions: Arc::new(permissions),
            cookie_name: Arc::from(settings.session.cookie_name.as_str()),
            cookie_secure: settings.session.cookie_secure,
        })
    }

    pub fn metrics(&self) -> &MetricsPtr {
        // ---
        &self.metrics
    }

    pub fn repository(&self) -> &RepositoryPtr {
        // ---
        &self.repository
    }

    pub fn session_store(&self) -> &SessionStorePtr {
        // ---
        &self.session_store
    }

    pub fn sessions(&self) -> &SessionManager {
        // ---
        &self.sessions
    }

    pub fn passwords(&self) -> &PasswordAuth {
        // ---
        &self.passwords
    }

    pub fn passkeys(&self) -> &PasskeyEngine {
        // ---
        &self.passkeys
    }

    pub fn permissions(&self) -> &PermissionEvaluator {
        // ---
        &self.permissions
    }

    /// Name of the session cookie.
    pub fn cookie_name(&self) -> &str {
        // ---
        &self.cookie_name
    }

    /// Whether the session cookie carries the `Secure` attribute.
    pub fn cookie_secure(&self) -> bool {
        // ---
        self.cookie_secure
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::config::WebAuthnConfig;
    use crate::infrastructure::{
        create_memory_repository, create_memory_session_store, create_noop_metrics,
        create_webauthn_verifier,
    };

    fn test_webauthn_config() -> WebAuthnConfig {
        // ---
        WebAuthnConfig {
            rp_id: "localhost".to_string(),
            rp_name: "Test App".to_string(),
            origin: "http://localhost:8080".to_string(),
            challenge_ttl: Duration::from_secs(300),
        }
    }

    #[test]
    fn test_app_state_creation_and_clone() {
        // ---
        let verifier = create_webauthn_verifier(&test_webauthn_config()).unwrap();
        let app_state = AppState::new(
            Arc::new(create_memory_repository()),
            Arc::new(create_memory_session_store()),
            verifier,
            create_noop_metrics().unwrap(),
            AuthSettings::default(),
        )
        .unwrap();

        let cloned = app_state.clone();
        assert_eq!(cloned.cookie_name(), "atlas.session");
        assert!(Arc::ptr_eq(&cloned.sessions, &app_state.sessions));
    }

    #[test]
    fn test_invalid_password_params_rejected() {
        // ---
        let mut settings = AuthSettings::default();
        settings.password.memory_kib = 1;

        let verifier = create_webauthn_verifier(&test_webauthn_config()).unwrap();
        let result = AppState::new(
            Arc::new(create_memory_repository()),
            Arc::new(create_memory_session_store()),
            verifier,
            create_noop_metrics().unwrap(),
            settings,
        );
        assert!(result.is_err());
    }
}
