//! Backend client traits.
//!
//! The reconciler and the token manager only see Vault through these traits.
//! [`VaultBackend`](super::VaultBackend) is the production implementation; the
//! integration tests drive the core with an in-memory one.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::error::Result;
use super::token::AccessToken;

/// Untyped field map as sent to and returned by Vault. Responses are decoded
/// into per-endpoint structs by [`super::responses`] before use.
pub type Fields = Map<String, Value>;

/// Hierarchical read/write/list plus KV v2 get/put.
#[async_trait]
pub trait SecretsBackend: Send + Sync {
    /// Read `path`. `Ok(None)` when the backend has nothing there.
    async fn read(&self, path: &str) -> Result<Option<Fields>>;

    /// Write `data` to `path`. Endpoints that return no body yield `Ok(None)`.
    async fn write(&self, path: &str, data: Fields) -> Result<Option<Fields>>;

    /// List keys under `path`. A missing path lists as empty.
    async fn list(&self, path: &str) -> Result<Fields>;

    /// Store `data` as the latest version of `name` in the KV v2 mount.
    async fn put_secret(&self, mount: &str, name: &str, data: Fields) -> Result<()>;

    /// Latest version of `name` in the KV v2 mount, `Ok(None)` if absent or deleted.
    async fn get_secret(&self, mount: &str, name: &str) -> Result<Option<Fields>>;
}

/// AppRole login, kept apart from [`SecretsBackend`] because it returns an
/// auth block rather than data.
#[async_trait]
pub trait AppRoleLogin: Send + Sync {
    async fn login(&self, mount: &str, role_id: &str, secret_id: &str) -> Result<AccessToken>;
}

/// Build a [`Fields`] map from string pairs.
pub fn fields<I, K, V>(pairs: I) -> Fields
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}
