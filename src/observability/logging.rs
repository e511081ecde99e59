//! # Structured Logging
//!
//! Installs the global `tracing` subscriber. The filter comes from `RUST_LOG`
//! when set, otherwise from the configured level. JSON output is meant for
//! log shippers; the default is human readable.
//!
//! Secret material is never passed to a logging macro: tokens, AppRole ids and
//! private keys are `SecretString`s and render as `[REDACTED]`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{AppConfig, LoggingConfig};
use crate::errors::{Error, Result};

/// Build the filter for `config`, preferring `RUST_LOG`.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| Error::config(format!("Invalid log level '{}': {}", config.level, e))),
    }
}

/// Install the global subscriber.
///
/// A subscriber that is already installed (integration tests) is left alone.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()
    };

    if installed.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
    Ok(())
}

/// Log a summary of the loaded configuration. Secrets are not included.
pub fn log_config_info(config: &AppConfig) {
    let resources = &config.resources;
    tracing::info!(
        vault_address = %config.vault.address,
        vault_namespace = ?config.vault.namespace,
        approle = config.vault.auth.approle.is_some(),
        reconcile_interval_secs = config.controller.reconcile_interval_seconds,
        root_cas = resources.root_cas.len(),
        intermediate_cas = resources.intermediate_cas.len(),
        certificates = resources.certificates.len(),
        key_pairs = resources.key_pairs.len(),
        "keykeeper configuration"
    );
}
