//! # keykeeper
//!
//! keykeeper keeps a private CA hierarchy backed by HashiCorp Vault alive:
//! root CA, intermediate (issuing) CAs, leaf certificates and raw key pairs.
//! It authenticates with AppRole, renews its own token, and periodically
//! reconciles every configured resource.
//!
//! ## Architecture
//!
//! ```text
//! config ──► Controller ──► root_ca / intermediate_ca / certificate / key_pair
//!                 │                         │
//!                 ▼                         ▼
//!          SecretsBackend ◄── TokenStore   pki (CSR, parsing, files)
//!                 ▲              ▲
//!           VaultBackend ── TokenManager (AppRole login, TTL/2 renewal)
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use keykeeper::config::AppConfig;
//! use keykeeper::controller::{Controller, Resource};
//! use keykeeper::secrets::{TokenManager, TokenStore, VaultBackend};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> keykeeper::Result<()> {
//! let config = AppConfig::from_yaml_file("/etc/keykeeper/config.yaml")?;
//! let tokens = Arc::new(TokenStore::new());
//! let backend = Arc::new(VaultBackend::new(&config.vault, tokens.clone())?);
//!
//! let shutdown = CancellationToken::new();
//! TokenManager::new(backend.clone(), tokens, config.vault.auth.clone())
//!     .authenticate(shutdown.clone())
//!     .await?;
//!
//! let controller = Controller::new(backend, Resource::from_config(&config.resources));
//! controller.run(config.controller.reconcile_interval(), shutdown).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod errors;
pub mod observability;
pub mod pki;
pub mod secrets;
pub mod utils;

pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
