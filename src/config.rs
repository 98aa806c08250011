// src/config.rs

//! Application configuration loaded from environment variables.
//!
//! This module defines all startup-time configuration for the service.
//! Configuration is validated eagerly and failures are treated as
//! deployment errors rather than recoverable runtime conditions.

use anyhow::Result;
use std::time::Duration;

// ============================================================
// Local macros (config-only, intentionally explicit)
// ============================================================

/// Reads a required environment variable.
///
/// # Behavior
/// - Fails fast if the variable is missing
/// - Produces a clear, human-readable error message
/// - Intended for startup-time configuration validation
macro_rules! required_env {
    // ---
    ($key:literal) => {
        std::env::var($key)
            .map_err(|_| anyhow::anyhow!(concat!("Missing required configuration: ", $key)))?
    };
}

/// Reads an optional environment variable and attempts to parse it.
///
/// If the variable is missing or cannot be parsed, the provided
/// default value is used.
macro_rules! optional_env_parse {
    // ---
    ($key:literal, $ty:ty, $default:expr) => {
        std::env::var($key)
            .ok()
            .and_then(|v| v.parse::<$ty>().ok())
            .unwrap_or($default)
    };
}

/// Reads an optional string environment variable with a default.
macro_rules! optional_env {
    // ---
    ($key:literal, $default:expr) => {
        std::env::var($key).unwrap_or_else(|_| $default.to_string())
    };
}

#[cfg(test)]
/// Asserts that a configuration constructor fails due to a missing
/// required environment variable.
macro_rules! assert_missing_config {
    // ---
    ($expr:expr, $key:literal) => {{
        let err = $expr.expect_err("expected configuration error");
        assert!(
            err.to_string()
                .contains(concat!("Missing required configuration: ", $key)),
            "unexpected error: {err}"
        );
    }};
}

// ============================================================
// Public configuration facade
// ============================================================

/// Which persistence backends the service runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    // ---
    /// PostgreSQL for accounts and configuration, Redis for sessions.
    Postgres,
    /// Process-local maps. Single instance only.
    Memory,
}

/// Aggregated application configuration.
///
/// This is the single source of truth for startup configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreType,
    /// Present when `store` is [`StoreType::Postgres`].
    pub database: Option<database::DatabaseConfig>,
    /// Present when `store` is [`StoreType::Postgres`].
    pub redis: Option<redis::RedisConfig>,
    pub webauthn: webauthn::WebAuthnConfig,
    pub session: session::SessionConfig,
    pub password: password::PasswordConfig,
    pub bootstrap: bootstrap::BootstrapConfig,
}

impl AppConfig {
    /// Loads and validates all application configuration from the environment.
    ///
    /// # Errors
    /// Returns an error if any required configuration is missing or invalid.
    pub fn from_env() -> Result<Self> {
        // ---
        let store = match optional_env!("ATLAS_STORE_TYPE", "postgres").as_str() {
            "postgres" => StoreType::Postgres,
            "memory" => StoreType::Memory,
            other => anyhow::bail!("Unsupported ATLAS_STORE_TYPE: {other}"),
        };

        let (database, redis) = match store {
            StoreType::Postgres => (
                Some(database::DatabaseConfig::from_env()?),
                Some(redis::RedisConfig::from_env()?),
            ),
            StoreType::Memory => (None, None),
        };

        let webauthn = webauthn::WebAuthnConfig::from_env()?;
        let session = session::SessionConfig::from_env(&webauthn)?;

        Ok(Self {
            store,
            database,
            redis,
            webauthn,
            session,
            password: password::PasswordConfig::from_env()?,
            bootstrap: bootstrap::BootstrapConfig::from_env(),
        })
    }
}

// ============================================================
// Database configuration
// ============================================================

mod database {
    // ---
    use super::*;

    /// Database-related configuration derived from environment variables.
    #[derive(Debug, Clone)]
    pub struct DatabaseConfig {
        /// PostgreSQL connection string.
        pub database_url: String,

        /// Number of retry attempts when initializing the database connection. Defaults to 50.
        pub retry_count: u32,

        /// Maximum time to wait when acquiring a connection from the pool. Defaults to 30 seconds.
        pub acquire_timeout: Duration,

        /// Minimum number of connections to keep in the pool, even when idle. Defaults to 2.
        pub min_connections: u32,

        /// Maximum number of connections to be open concurrently. Defaults to 15
        pub max_connections: u32,
    }

    impl DatabaseConfig {
        /// Builds a [`DatabaseConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if required configuration is missing.
        pub fn from_env() -> Result<Self> {
            // ---
            let database_url = required_env!("DATABASE_URL");
            let retry_count = optional_env_parse!("ATLAS_DB_RETRY_COUNT", u32, 50);
            let acquire_timeout_secs = optional_env_parse!("ATLAS_DB_ACQUIRE_TIMEOUT_SEC", u64, 30);
            let min_connections = optional_env_parse!("ATLAS_DB_MIN_CONNECTIONS", u32, 2);
            let max_connections = optional_env_parse!("ATLAS_DB_MAX_CONNECTIONS", u32, 15);

            Ok(Self {
                database_url,
                retry_count,
                acquire_timeout: Duration::from_secs(acquire_timeout_secs),
                min_connections,
                max_connections,
            })
        }
    }
}
pub use database::DatabaseConfig;

// ============================================================
// Redis configuration
// ============================================================

mod redis {
    // ---
    use super::*;

    /// Redis holds server-side sessions so every instance sees the same
    /// session state.
    #[derive(Debug, Clone)]
    pub struct RedisConfig {
        /// Redis connection string.
        pub url: String,
    }

    impl RedisConfig {
        /// Builds a [`RedisConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if required configuration is missing.
        pub fn from_env() -> Result<Self> {
            // ---
            let url = required_env!("ATLAS_REDIS_URL");
            Ok(Self { url })
        }
    }
}
pub use redis::RedisConfig;

// ============================================================
// WebAuthn configuration
// ============================================================

mod webauthn {
    // ---
    use super::*;

    /// WebAuthn / Passkeys configuration.
    ///
    /// These values define the relying party identity and security
    /// origin used during WebAuthn registration and authentication.
    #[derive(Debug, Clone)]
    pub struct WebAuthnConfig {
        /// Relying Party ID (typically a domain name).
        pub rp_id: String,

        /// Human-readable Relying Party name.
        pub rp_name: String,

        /// Fully-qualified origin (e.g. https://example.com).
        pub origin: String,

        /// An outstanding challenge older than this can no longer complete.
        pub challenge_ttl: Duration,
    }

    impl WebAuthnConfig {
        /// Builds a [`WebAuthnConfig`] from environment variables.
        pub fn from_env() -> Result<Self> {
            // ---
            let rp_id = optional_env!("ATLAS_WEBAUTHN_RP_ID", "localhost");
            let origin = optional_env!("ATLAS_WEBAUTHN_ORIGIN", "http://localhost:3000");
            let rp_name = optional_env!("ATLAS_WEBAUTHN_RP_NAME", "Atlas AI Support Assistant");
            let ttl_secs = optional_env_parse!("ATLAS_WEBAUTHN_CHALLENGE_TTL_SEC", u64, 300);

            Ok(Self {
                rp_id,
                rp_name,
                origin,
                challenge_ttl: Duration::from_secs(ttl_secs),
            })
        }
    }
}
pub use webauthn::WebAuthnConfig;

// ============================================================
// Session configuration
// ============================================================

mod session {
    // ---
    use super::*;

    /// Session lifetime limits and cookie attributes.
    #[derive(Debug, Clone)]
    pub struct SessionConfig {
        /// Maximum lifetime from creation, regardless of activity. Defaults to 24h.
        pub absolute_timeout: Duration,

        /// Maximum time between requests. Defaults to 30m.
        pub idle_timeout: Duration,

        pub cookie_name: String,

        /// Whether the cookie carries the `Secure` attribute.
        pub cookie_secure: bool,
    }

    impl SessionConfig {
        /// Builds a [`SessionConfig`] from environment variables.
        ///
        /// The cookie is `Secure` by default whenever the configured origin
        /// is served over https.
        pub fn from_env(webauthn: &WebAuthnConfig) -> Result<Self> {
            // ---
            let absolute = optional_env_parse!("ATLAS_SESSION_ABSOLUTE_TIMEOUT_SEC", u64, 86_400);
            let idle = optional_env_parse!("ATLAS_SESSION_IDLE_TIMEOUT_SEC", u64, 1_800);
            let cookie_name = optional_env!("ATLAS_SESSION_COOKIE_NAME", "atlas.session");
            let cookie_secure = optional_env_parse!(
                "ATLAS_SESSION_COOKIE_SECURE",
                bool,
                webauthn.origin.starts_with("https://")
            );

            anyhow::ensure!(absolute > 0, "ATLAS_SESSION_ABSOLUTE_TIMEOUT_SEC must be positive");
            anyhow::ensure!(idle > 0, "ATLAS_SESSION_IDLE_TIMEOUT_SEC must be positive");

            Ok(Self {
                absolute_timeout: Duration::from_secs(absolute),
                idle_timeout: Duration::from_secs(idle),
                cookie_name,
                cookie_secure,
            })
        }
    }

    impl Default for SessionConfig {
        fn default() -> Self {
            // ---
            Self {
                absolute_timeout: Duration::from_secs(86_400),
                idle_timeout: Duration::from_secs(1_800),
                cookie_name: "atlas.session".to_string(),
                cookie_secure: false,
            }
        }
    }
}
pub use session::SessionConfig;

// ============================================================
// Password hashing configuration
// ============================================================

mod password {
    // ---
    use super::*;

    /// Argon2id cost parameters for newly created hashes. Existing hashes
    /// carry their own parameters.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PasswordConfig {
        /// Memory cost in KiB. Defaults to 19456 (19 MiB).
        pub memory_kib: u32,
        /// Number of passes. Defaults to 2.
        pub iterations: u32,
        /// Degree of parallelism. Defaults to 1.
        pub parallelism: u32,
    }

    impl PasswordConfig {
        /// Builds a [`PasswordConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if the parameters are rejected by Argon2.
        pub fn from_env() -> Result<Self> {
            // ---
            let config = Self {
                memory_kib: optional_env_parse!("ATLAS_PASSWORD_MEMORY_KIB", u32, 19_456),
                iterations: optional_env_parse!("ATLAS_PASSWORD_ITERATIONS", u32, 2),
                parallelism: optional_env_parse!("ATLAS_PASSWORD_PARALLELISM", u32, 1),
            };
            config.params()?;
            Ok(config)
        }

        pub fn params(&self) -> Result<argon2::Params> {
            // ---
            argon2::Params::new(self.memory_kib, self.iterations, self.parallelism, None)
                .map_err(|e| anyhow::anyhow!("Invalid password hashing parameters: {e}"))
        }
    }

    impl Default for PasswordConfig {
        fn default() -> Self {
            // ---
            Self {
                memory_kib: 19_456,
                iterations: 2,
                parallelism: 1,
            }
        }
    }
}
pub use password::PasswordConfig;

// ============================================================
// Bootstrap configuration
// ============================================================

mod bootstrap {
    // ---

    /// Optional first-start admin account.
    #[derive(Clone, Default)]
    pub struct BootstrapConfig {
        pub admin_username: String,
        pub admin_email: String,
        /// When unset, no admin account is seeded.
        pub admin_password: Option<String>,
    }

    impl std::fmt::Debug for BootstrapConfig {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("BootstrapConfig")
                .field("admin_username", &self.admin_username)
                .field("admin_email", &self.admin_email)
                .field("admin_password", &self.admin_password.as_ref().map(|_| "<redacted>"))
                .finish()
        }
    }

    impl BootstrapConfig {
        pub fn from_env() -> Self {
            // ---
            Self {
                admin_username: optional_env!("ATLAS_ADMIN_USERNAME", "admin"),
                admin_email: optional_env!("ATLAS_ADMIN_EMAIL", "admin@atlas.local"),
                admin_password: std::env::var("ATLAS_ADMIN_PASSWORD").ok(),
            }
        }
    }
}
pub use bootstrap::BootstrapConfig;

// ============================================================
// Tests
// ============================================================
