//! Process-wide holder for the current Vault token.
//!
//! Every outbound backend call loads the token from a [`TokenStore`]; the
//! renewal loop replaces it. The holder is an [`ArcSwapOption`], so a reader
//! gets either the previous token or the new one as a whole, and renewal never
//! blocks a reader.

use arc_swap::ArcSwapOption;
use std::sync::Arc;
use std::time::Duration;

use super::types::SecretString;

/// A Vault token together with the lease it was granted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: SecretString,
    /// Lease duration reported at login. Zero means the token does not expire.
    pub ttl: Duration,
}

impl AccessToken {
    pub fn new(token: impl Into<SecretString>, ttl: Duration) -> Self {
        Self { token: token.into(), ttl }
    }

    /// Whether this token needs a renewal loop at all.
    pub fn expires(&self) -> bool {
        !self.ttl.is_zero()
    }
}

/// Shared, atomically replaceable token slot.
#[derive(Debug, Default)]
pub struct TokenStore {
    current: ArcSwapOption<AccessToken>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the token in use right now.
    pub fn current(&self) -> Option<Arc<AccessToken>> {
        self.current.load_full()
    }

    /// Install a new token. Callers that already loaded the previous one keep it
    /// until their request finishes.
    pub fn replace(&self, token: AccessToken) {
        self.current.store(Some(Arc::new(token)));
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.load().is_some()
    }
}
