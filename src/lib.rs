// src/lib.rs
use anyhow::{anyhow, Result};
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::env;
use std::sync::Arc;

// Public exports (visible outside this module)
pub mod domain;

// Internal-only exports (sibling access within this module)
mod app_state;
mod bootstrap;
mod config;
mod handlers;
mod infrastructure;
mod passkey;
mod password;
mod permissions;
mod session;

// Hoist up only the public symbol(s)
pub use app_state::{AppState, AuthSettings};
pub use bootstrap::{seed_admin, seed_permissions};
pub use passkey::PasskeyEngine;
pub use password::PasswordAuth;
pub use permissions::PermissionEvaluator;
pub use session::{AuthContext, SessionManager};

pub use config::*;

// Publicly expose the infrastructure creation functions
pub use infrastructure::{
    create_memory_repository, // ---
    create_memory_session_store,
    create_noop_metrics,
    create_postgres_repository,
    create_prom_metrics,
    create_redis_session_store,
    create_webauthn,
    create_webauthn_verifier,
    init_database_with_retry,
    MemoryRepository,
    MemorySessionStore,
    PostgresRepository,
    RedisSessionStore,
    WebauthnVerifier,
};

use domain::{MetricsPtr, RepositoryPtr, SessionStorePtr};

/// Build the HTTP router from environment configuration.
///
/// Connects the configured backends, seeds the permission matrix and the
/// optional admin account, then wires everything into [`AppState`].
pub async fn create_router() -> Result<Router> {
    // ---
    // Load all configuration from environment
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt::try_init().ok(); // Ignores if already initialized

    let metrics = metrics_from_env()?;
    let (repository, session_store) = create_stores(&config).await?;
    let verifier = create_webauthn_verifier(&config.webauthn)?;

    let state = AppState::new(
        repository.clone(),
        session_store,
        verifier,
        metrics,
        AuthSettings::from_config(&config),
    )?;

    seed_permissions(&repository).await?;
    seed_admin(state.passwords(), &repository, &config.bootstrap).await?;

    Ok(build_router(state))
}

/// Routes every endpoint onto an already-built state.
pub fn build_router(state: AppState) -> Router {
    // ---
    let auth = Router::new()
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/me", get(handlers::me))
        .nest(
            "/passkey",
            Router::new()
                .route("/register-options", post(handlers::register_options))
                .route("/register-verify", post(handlers::register_verify))
                .route("/auth-options", post(handlers::auth_options))
                .route("/auth-verify", post(handlers::auth_verify))
                .route("/credentials", get(handlers::list_credentials))
                .route("/credentials/{id}", delete(handlers::delete_credential)),
        );

    Router::new()
        .route("/", get(handlers::root_handler))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .nest("/auth", auth)
        .route(
            "/config/permissions",
            get(handlers::get_permissions).put(handlers::update_permissions),
        )
        .route("/users/{username}", get(handlers::get_user))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::track_http_metrics,
        ))
        .with_state(state)
}

// Determine metrics implementation from environment
fn metrics_from_env() -> Result<MetricsPtr> {
    // ---
    let metrics_type = env::var("ATLAS_METRICS_TYPE").unwrap_or_else(|_| "noop".to_string());
    if metrics_type == "prom" {
        create_prom_metrics()
    } else {
        create_noop_metrics()
    }
}

async fn create_stores(config: &AppConfig) -> Result<(RepositoryPtr, SessionStorePtr)> {
    // ---
    match config.store {
        StoreType::Memory => {
            tracing::warn!("Using in-memory stores; data is lost on restart");
            Ok((
                Arc::new(create_memory_repository()),
                Arc::new(create_memory_session_store()),
            ))
        }
        StoreType::Postgres => {
            let database = config
                .database
                .as_ref()
                .ok_or_else(|| anyhow!("database configuration missing"))?;
            let redis = config
                .redis
                .as_ref()
                .ok_or_else(|| anyhow!("redis configuration missing"))?;

            init_database_with_retry(database).await?;
            Ok((
                create_postgres_repository()?,
                create_redis_session_store(&redis.url)?,
            ))
        }
    }
}
