//! Vault access for keykeeper.
//!
//! - [`SecretsBackend`] / [`AppRoleLogin`]: the only way the core talks to Vault
//! - [`VaultBackend`]: HTTP implementation bounded by a per-call timeout
//! - [`TokenStore`]: lock-free holder of the token every call sends
//! - [`TokenManager`]: AppRole authentication and TTL/2 renewal
//! - [`responses`]: typed decoding of the endpoints the reconciler uses
//!
//! Secret material (tokens, AppRole ids, private keys) is carried in
//! [`SecretString`] and never logged.

pub mod auth;
pub mod backend;
pub mod error;
pub mod responses;
pub mod token;
pub mod types;
pub mod vault;

pub use auth::{renewal_delay, AppRoleCredentials, TokenManager};
pub use backend::{fields, AppRoleLogin, Fields, SecretsBackend};
pub use error::{Result, SecretsError};
pub use token::{AccessToken, TokenStore};
pub use types::SecretString;
pub use vault::VaultBackend;
