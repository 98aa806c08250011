mod database;
mod memory;
pub mod metrics;
mod redis_store;
mod webauthn;

// Re-export the factory functions for easy access
pub use database::{create_postgres_repository, init_database_with_retry, PostgresRepository};
pub use memory::{
    create_memory_repository, create_memory_session_store, MemoryRepository, MemorySessionStore,
};
pub use metrics::{create_noop_metrics, create_prom_metrics};
pub use redis_store::{create_redis_session_store, RedisSessionStore};
pub use webauthn::{create_webauthn, create_webauthn_verifier, WebauthnVerifier};
