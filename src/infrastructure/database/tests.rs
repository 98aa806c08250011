//! PostgreSQL repository tests. They need a reachable `DATABASE_URL` and
//! are ignored by default: `cargo test -- --ignored` runs them.

use super::init::init_database_with_retry;
use crate::config::DatabaseConfig;
use super::postgres_repository::*;
use crate::domain::{
    Account, Ceremony, Credential, CredentialId, LastLogin, NewAccount, PendingChallenge,
    PermissionMatrix, RepositoryPtr, Role,
};
use once_cell::sync::Lazy;
use tokio::runtime::Runtime;
use uuid::Uuid;

/// Shared tokio runtime for all database tests.
///
/// The pool lives in a process-wide cell, so every test must run on the
/// runtime that created it. A per-test runtime would close the pool's
/// connections when it drops.
static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    // ---
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create TOKIO runtime")
});

static TRACING_INIT: std::sync::Once = std::sync::Once::new();

fn init_tracing() {
    // ---
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_test_writer()
            .init();
    });
}

async fn setup_repo() -> RepositoryPtr {
    // ---
    init_tracing();

    let config = DatabaseConfig::from_env().expect("DATABASE_URL must be set");
    init_database_with_retry(&config)
        .await
        .expect("database init failed");

    create_postgres_repository().expect("repository creation failed")
}

/// Unique names so repeated runs against the same database never collide.
fn unique_account(prefix: &str) -> Account {
    // ---
    let tag = &Uuid::new_v4().simple().to_string()[..8];
    NewAccount {
        username: format!("{prefix}-{tag}"),
        email: format!("{prefix}-{tag}@example.com"),
        password: "unused".to_string(),
        first_name: "Test".to_string(),
        last_name: String::new(),
        role: Role::Support,
        email_verified: true,
    }
    .into_account()
}

fn unique_credential_id() -> CredentialId {
    // ---
    CredentialId::new(Uuid::new_v4().as_bytes().to_vec())
}

#[test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
fn test_create_and_lookup_account() {
    // ---
    RUNTIME.block_on(async {
        // ---
        let repo = setup_repo().await;
        let account = unique_account("thorin");

        repo.create_account(&account, "$argon2id$fake")
            .await
            .expect("Failed to create account");

        let by_name = repo
            .get_account_by_username(&account.username)
            .await
            .expect("Query should succeed")
            .expect("Account not found");
        assert_eq!(by_name.id, account.id);
        assert_eq!(by_name.role, Role::Support);

        let by_email = repo
            .get_account_by_identifier(&account.email.to_uppercase())
            .await
            .expect("Query should succeed")
            .expect("Account not found by email");
        assert_eq!(by_email.id, account.id);

        let hash = repo.get_password_hash(account.id).await.unwrap();
        assert_eq!(hash.as_deref(), Some("$argon2id$fake"));

        assert!(repo
            .get_account_by_id(Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    });
}

#[test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
fn test_username_must_be_unique() {
    // ---
    RUNTIME.block_on(async {
        // ---
        let repo = setup_repo().await;
        let first = unique_account("fili");
        repo.create_account(&first, "h").await.unwrap();

        let mut second = unique_account("kili");
        second.username = first.username.clone();

        let result = repo.create_account(&second, "h").await;
        assert!(result.is_err(), "Duplicate username should fail");
    });
}

#[test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
fn test_credentials_keep_registration_order() {
    // ---
    RUNTIME.block_on(async {
        // ---
        let repo = setup_repo().await;
        let account = unique_account("balin");
        repo.create_account(&account, "h").await.unwrap();

        let ids: Vec<CredentialId> = (0..3).map(|_| unique_credential_id()).collect();
        for id in &ids {
            let cred = Credential::new(id.clone(), vec![1, 2, 3], 0, vec!["internal".into()]);
            repo.add_credential(account.id, &cred).await.unwrap();
        }

        let stored = repo.get_credentials(account.id).await.unwrap();
        let stored_ids: Vec<CredentialId> = stored.iter().map(|c| c.id.clone()).collect();
        assert_eq!(stored_ids, ids);
        assert_eq!(stored[0].transports, vec!["internal"]);

        let loaded = repo.get_account_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(loaded.passkey_credentials.len(), 3);

        assert_eq!(
            repo.find_credential_owner(&ids[1]).await.unwrap(),
            Some(account.id)
        );
    });
}

#[test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
fn test_update_and_delete_credential() {
    // ---
    RUNTIME.block_on(async {
        // ---
        let repo = setup_repo().await;
        let account = unique_account("dwalin");
        repo.create_account(&account, "h").await.unwrap();

        let mut cred = Credential::new(unique_credential_id(), vec![5, 5], 0, vec![]);
        repo.add_credential(account.id, &cred).await.unwrap();

        cred.counter = u32::MAX;
        repo.update_credential(account.id, &cred).await.unwrap();
        let stored = repo.get_credentials(account.id).await.unwrap();
        assert_eq!(stored[0].counter, u32::MAX);

        assert!(repo.delete_credential(account.id, &cred.id).await.unwrap());
        assert!(!repo.delete_credential(account.id, &cred.id).await.unwrap());
    });
}

#[test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
fn test_take_challenge_consumes_once() {
    // ---
    RUNTIME.block_on(async {
        // ---
        let repo = setup_repo().await;
        let account = unique_account("ori");
        repo.create_account(&account, "h").await.unwrap();

        let pending = PendingChallenge::new(
            Ceremony::Registration,
            "challenge-1".to_string(),
            serde_json::json!({ "opaque": true }),
        );
        repo.set_challenge(account.id, &pending).await.unwrap();

        assert!(repo
            .take_challenge(account.id, "someone-else")
            .await
            .unwrap()
            .is_none());

        let taken = repo
            .take_challenge(account.id, "challenge-1")
            .await
            .unwrap()
            .expect("challenge should be consumed");
        assert_eq!(taken.ceremony, Ceremony::Registration);
        assert_eq!(taken.state, serde_json::json!({ "opaque": true }));

        assert!(repo
            .take_challenge(account.id, "challenge-1")
            .await
            .unwrap()
            .is_none());
    });
}

#[test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
fn test_record_login_and_permissions() {
    // ---
    RUNTIME.block_on(async {
        // ---
        let repo = setup_repo().await;
        let account = unique_account("nori");
        repo.create_account(&account, "h").await.unwrap();

        let login = LastLogin {
            timestamp: chrono::Utc::now(),
            ip: "10.1.2.3".to_string(),
            device: "Firefox".to_string(),
            os: "Linux".to_string(),
        };
        repo.record_login(account.id, &login).await.unwrap();
        let loaded = repo.get_account_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(loaded.last_login.unwrap().ip, "10.1.2.3");

        let matrix = PermissionMatrix::seed();
        repo.save_permissions(&matrix).await.unwrap();
        assert_eq!(repo.load_permissions().await.unwrap(), Some(matrix));
    });
}
