// Gateway module - controls public API for handlers
// Modules are private, only exported symbols are public

mod auth;
mod config;
mod extract;
mod health;
mod metrics;
mod passkey;
mod root;
mod shared_types;
mod users;

// Core handlers
pub use health::health_check;
pub use metrics::{metrics_handler, track_http_metrics};
pub use root::root_handler;

// Password login and session handlers
pub use auth::{login, logout, me};

// Passkey ceremony and credential handlers
pub use passkey::{
    auth_options, auth_verify, delete_credential, list_credentials, register_options,
    register_verify,
};

// Permission matrix handlers
pub use config::{get_permissions, update_permissions};

// Gated user lookup
pub use users::get_user;
