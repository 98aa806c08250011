// Test helpers are intentionally partially used
#![allow(dead_code)]

use atlas_auth::domain::{
    Account, AuthError, CeremonyVerifier, Credential, CredentialId, CredentialResponse,
    IssuedChallenge, MetricsPtr, NewAccount, PendingChallenge, RegisteredCredential, Role,
    VerifiedAssertion,
};
use atlas_auth::{
    build_router, create_memory_session_store, create_noop_metrics, seed_permissions, AppState,
    AuthSettings, MemoryRepository, PasswordConfig,
};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceExt;

pub const ORIGIN: &str = "http://localhost:3000";
pub const RP_ID: &str = "localhost";
pub const PASSWORD: &str = "correct-horse";
pub const COOKIE_NAME: &str = "atlas.session";

// ============================================================================
// Deterministic ceremony verifier
// ============================================================================

/// Verifier with the same contract as the webauthn-rs backend but a
/// transparent response format, so tests can forge good and bad responses.
///
/// A response carries `response.challenge` and `response.origin` in the
/// clear. Registration adds `response.publicKey` and an optional starting
/// `response.counter`; an assertion adds
/// `response.counter` and a `response.signature` equal to
/// `"{publicKey}|{challenge}|{counter}"`.
pub struct FakeVerifier;

impl FakeVerifier {
    // ---
    fn issue(&self, body: Value) -> IssuedChallenge {
        // ---
        let challenge = URL_SAFE_NO_PAD.encode(uuid::Uuid::new_v4().as_bytes());
        let mut options = body;
        options["challenge"] = json!(challenge);

        IssuedChallenge {
            options: json!({ "publicKey": options }),
            state: json!({ "challenge": challenge }),
            challenge,
        }
    }

    fn check_client_data(
        response: &CredentialResponse,
        pending: &PendingChallenge,
    ) -> Result<(), AuthError> {
        // ---
        let challenge = response.0.pointer("/response/challenge").and_then(Value::as_str);
        let origin = response.0.pointer("/response/origin").and_then(Value::as_str);

        if challenge != Some(pending.challenge.as_str()) || origin != Some(ORIGIN) {
            return Err(AuthError::VerificationFailed);
        }
        Ok(())
    }
}

impl CeremonyVerifier for FakeVerifier {
    // ---
    fn start_registration(
        &self,
        account: &Account,
        exclude: &[CredentialId],
    ) -> Result<IssuedChallenge, AuthError> {
        // ---
        Ok(self.issue(json!({
            "rp": { "id": RP_ID, "name": "Atlas Test" },
            "user": { "id": account.id.to_string(), "name": account.username },
            "excludeCredentials": exclude
                .iter()
                .map(|id| json!({ "type": "public-key", "id": id }))
                .collect::<Vec<_>>(),
        })))
    }

    fn finish_registration(
        &self,
        response: &CredentialResponse,
        pending: &PendingChallenge,
    ) -> Result<RegisteredCredential, AuthError> {
        // ---
        Self::check_client_data(response, pending)?;

        let id = response.credential_id().ok_or(AuthError::VerificationFailed)?;
        let public_key = response
            .0
            .pointer("/response/publicKey")
            .and_then(Value::as_str)
            .ok_or(AuthError::VerificationFailed)?;

        let counter = response
            .0
            .pointer("/response/counter")
            .and_then(Value::as_u64)
            .and_then(|c| u32::try_from(c).ok())
            .unwrap_or(0);

        Ok(RegisteredCredential {
            id,
            public_key: public_key.as_bytes().to_vec(),
            counter,
        })
    }

    fn start_authentication(&self, credentials: &[Credential]) -> Result<IssuedChallenge, AuthError> {
        // ---
        Ok(self.issue(json!({
            "rpId": RP_ID,
            "allowCredentials": credentials
                .iter()
                .map(|c| json!({ "type": "public-key", "id": c.id }))
                .collect::<Vec<_>>(),
        })))
    }

    fn finish_authentication(
        &self,
        response: &CredentialResponse,
        pending: &PendingChallenge,
        credential: &Credential,
    ) -> Result<VerifiedAssertion, AuthError> {
        // ---
        Self::check_client_data(response, pending)?;

        let counter = response
            .0
            .pointer("/response/counter")
            .and_then(Value::as_u64)
            .and_then(|c| u32::try_from(c).ok())
            .ok_or(AuthError::VerificationFailed)?;
        let signature = response.0.pointer("/response/signature").and_then(Value::as_str);

        let key = String::from_utf8_lossy(&credential.public_key);
        let expected = format!("{key}|{}|{counter}", pending.challenge);
        if signature != Some(expected.as_str()) {
            return Err(AuthError::VerificationFailed);
        }

        Ok(VerifiedAssertion {
            credential_id: credential.id.clone(),
            counter,
            public_key: None,
        })
    }
}

/// A software authenticator producing responses [`FakeVerifier`] accepts.
#[derive(Debug, Clone)]
pub struct FakeAuthenticator {
    // ---
    pub id: CredentialId,
    pub key: String,
    pub counter: u32,
}

impl FakeAuthenticator {
    // ---
    pub fn new(seed: &str) -> Self {
        // ---
        Self {
            id: CredentialId::new(format!("cred-{seed}").into_bytes()),
            key: format!("key-{seed}"),
            counter: 0,
        }
    }

    pub fn challenge_of(options: &Value) -> String {
        // ---
        options["publicKey"]["challenge"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }

    /// Attestation bound to the challenge in `options`.
    pub fn attest(&self, options: &Value) -> CredentialResponse {
        // ---
        self.attest_challenge(&Self::challenge_of(options))
    }

    pub fn attest_challenge(&self, challenge: &str) -> CredentialResponse {
        // ---
        let id = self.id.to_base64url();
        CredentialResponse(json!({
            "id": id,
            "rawId": id,
            "type": "public-key",
            "response": {
                "challenge": challenge,
                "origin": ORIGIN,
                "publicKey": self.key,
                "transports": ["internal"],
            },
        }))
    }

    /// Attestation reporting a nonzero starting signature counter.
    pub fn attest_with_counter(&mut self, options: &Value, counter: u32) -> CredentialResponse {
        // ---
        self.counter = counter;
        let mut response = self.attest(options);
        response.0["response"]["counter"] = json!(counter);
        response
    }

    /// Next assertion: the counter advances by one.
    pub fn assert(&mut self, options: &Value) -> CredentialResponse {
        // ---
        self.counter += 1;
        self.assert_with_counter(&Self::challenge_of(options), self.counter)
    }

    pub fn assert_with_counter(&self, challenge: &str, counter: u32) -> CredentialResponse {
        // ---
        let id = self.id.to_base64url();
        CredentialResponse(json!({
            "id": id,
            "rawId": id,
            "type": "public-key",
            "response": {
                "challenge": challenge,
                "origin": ORIGIN,
                "counter": counter,
                "signature": format!("{}|{challenge}|{counter}", self.key),
            },
        }))
    }
}

// ============================================================================
// Test application
// ============================================================================

/// Cheap Argon2 cost so tests stay fast.
pub fn test_settings() -> AuthSettings {
    // ---
    AuthSettings {
        password: PasswordConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
        ..AuthSettings::default()
    }
}

pub struct TestApp {
    pub state: AppState,
    pub repository: Arc<MemoryRepository>,
    pub router: Router,
}

impl TestApp {
    // ---
    /// In-memory app with the default permission matrix.
    pub async fn new() -> Self {
        // ---
        Self::with_metrics(create_noop_metrics().unwrap(), true).await
    }

    /// In-memory app without any permission matrix stored.
    pub async fn unseeded() -> Self {
        // ---
        Self::with_metrics(create_noop_metrics().unwrap(), false).await
    }

    pub async fn with_metrics(metrics: MetricsPtr, seed: bool) -> Self {
        // ---
        let repository = Arc::new(MemoryRepository::new());
        let state = AppState::new(
            repository.clone(),
            Arc::new(create_memory_session_store()),
            Arc::new(FakeVerifier),
            metrics,
            test_settings(),
        )
        .unwrap();

        if seed {
            seed_permissions(state.repository()).await.unwrap();
        }

        let router = build_router(state.clone());
        Self {
            state,
            repository,
            router,
        }
    }

    /// Creates an account with [`PASSWORD`].
    pub async fn create_user(&self, username: &str, role: Role) -> Account {
        // ---
        self.state
            .passwords()
            .create_account(NewAccount {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password: PASSWORD.to_string(),
                first_name: username.to_string(),
                last_name: String::new(),
                role,
                email_verified: true,
            })
            .await
            .unwrap()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        session: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        // ---
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = session {
            builder = builder.header(header::COOKIE, format!("{COOKIE_NAME}={token}"));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        TestResponse::read(response).await
    }

    /// Password login; returns the session token.
    pub async fn login(&self, username: &str) -> String {
        // ---
        let res = self
            .send(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "username": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "login failed: {}", res.body);
        res.session_cookie().expect("login sets the session cookie")
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub set_cookies: Vec<String>,
    pub body: Value,
}

impl TestResponse {
    // ---
    async fn read(response: axum::response::Response) -> Self {
        // ---
        let status = response.status();
        let set_cookies = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        Self {
            status,
            set_cookies,
            body,
        }
    }

    /// Value of the session cookie set by this response, if any. A removal
    /// shows up as `Some("")`.
    pub fn session_cookie(&self) -> Option<String> {
        // ---
        self.set_cookies.iter().find_map(|c| {
            let pair = c.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            (name.trim() == COOKIE_NAME).then(|| value.trim().to_string())
        })
    }
}

// ============================================================================
// Real server
// ============================================================================

pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
}

impl TestServer {
    // ---
    /// Serves the app's router on an ephemeral port with peer addresses
    /// available to handlers.
    pub async fn new(app: &TestApp) -> Self {
        // ---
        let router = app.router.clone();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            addr,
            client: Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        // ---
        format!("http://{}{}", self.addr, path)
    }
}
