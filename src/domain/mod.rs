mod account;
mod challenge;
mod credential;
mod error;
mod metrics;
mod permissions;
mod repository;
mod session;
mod verifier;

// Publicly expose the Metrics abstraction
pub use metrics::{Metrics, MetricsPtr};

// Persistence abstractions
pub use repository::{Repository, RepositoryPtr, SessionStore, SessionStorePtr};

// Passkey verification abstraction
pub use verifier::{
    CeremonyVerifier, IssuedChallenge, RegisteredCredential, VerifiedAssertion, VerifierPtr,
};

// Data model
pub use account::{
    Account, AccountProfile, ClientInfo, LastLogin, NewAccount, Role, PASSWORD_MIN_LEN,
    USERNAME_MAX_LEN, USERNAME_MIN_LEN,
};
pub use challenge::{Ceremony, PendingChallenge};
pub use credential::{counter_advances, Credential, CredentialId, CredentialResponse};
pub use error::{AuthError, AuthResult};
pub use permissions::{Capability, PermissionMatrix, RolePermissions};
pub use session::SessionRecord;
