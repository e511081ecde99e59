//! # Configuration Settings
//!
//! Defines the configuration structure for keykeeper: Vault connection and
//! authentication, the reconcile loop, logging, and the resources to keep.

use crate::errors::{Error, Result};
use crate::secrets::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

use super::resources::{parse_ttl, Resources};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    /// Vault connection and authentication
    #[validate(nested)]
    pub vault: VaultConfig,

    /// Reconcile loop
    #[serde(default)]
    #[validate(nested)]
    pub controller: ControllerConfig,

    /// Logging output
    #[serde(default)]
    #[validate(nested)]
    pub logging: LoggingConfig,

    /// CAs, certificates and key pairs to keep
    #[serde(default)]
    #[validate(nested)]
    pub resources: Resources,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.validate_custom()?;
        Ok(())
    }

    /// Cross-field checks the validator derive cannot express
    fn validate_custom(&self) -> Result<()> {
        let resources = &self.resources;

        unique_names("root_cas", resources.root_cas.iter().map(|r| r.name.as_str()))?;
        unique_names("intermediate_cas", resources.intermediate_cas.iter().map(|r| r.name.as_str()))?;
        unique_names("certificates", resources.certificates.iter().map(|r| r.name.as_str()))?;
        unique_names("key_pairs", resources.key_pairs.iter().map(|r| r.name.as_str()))?;

        let stored = resources
            .intermediate_cas
            .iter()
            .map(|r| ("intermediate CA", r.kv_path.as_str(), r.name.as_str()))
            .chain(resources.certificates.iter().map(|r| ("certificate", r.kv_path.as_str(), r.name.as_str())))
            .chain(resources.key_pairs.iter().map(|r| ("key pair", r.kv_path.as_str(), r.name.as_str())));
        let mut owners = HashMap::new();
        for (kind, kv_path, name) in stored {
            if let Some(other) = owners.insert((kv_path, name), kind) {
                return Err(Error::validation(format!(
                    "{} '{}' and {} '{}' share the KV secret '{}/{}'",
                    other, name, kind, name, kv_path, name
                )));
            }
        }

        let lifetimes = resources
            .root_cas
            .iter()
            .map(|r| ("Root CA", &r.name, &r.ttl, r.renewal_threshold()))
            .chain(resources.intermediate_cas.iter().map(|r| ("Intermediate CA", &r.name, &r.ttl, r.renewal_threshold())))
            .chain(resources.certificates.iter().map(|r| ("Certificate", &r.name, &r.ttl, r.renewal_threshold())));
        for (kind, name, ttl, threshold) in lifetimes {
            let lifetime = parse_ttl(ttl).ok_or_else(|| {
                Error::validation(format!("{} '{}' has an invalid ttl '{}'", kind, name, ttl))
            })?;
            if threshold >= lifetime {
                return Err(Error::validation(format!(
                    "{} '{}' renewal threshold ({}h) must be shorter than its ttl '{}'",
                    kind,
                    name,
                    threshold.as_secs() / 3600,
                    ttl
                )));
            }
        }

        for cert in &resources.certificates {
            if resources.issuer(&cert.issuer).is_none() {
                return Err(Error::validation(format!(
                    "Certificate '{}' references unknown issuer '{}'",
                    cert.name, cert.issuer
                )));
            }
        }

        if let Some(approle) = &self.vault.auth.approle {
            if approle.role_id_local_path == approle.secret_id_local_path {
                return Err(Error::validation(
                    "AppRole role id and secret id cache paths must differ",
                ));
            }
        }

        Ok(())
    }
}

fn unique_names<'a>(kind: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(Error::validation(format!("Duplicate name '{}' in {}", name, kind)));
        }
    }
    Ok(())
}

/// Vault server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VaultConfig {
    /// Vault address, e.g. `https://vault:8200`
    #[validate(length(min = 1, message = "Vault address cannot be empty"))]
    pub address: String,

    /// Vault Enterprise namespace
    #[serde(default)]
    pub namespace: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    #[validate(range(
        min = 1,
        max = 300,
        message = "Timeout must be between 1 and 300 seconds"
    ))]
    pub timeout_seconds: u64,

    /// How keykeeper obtains its token
    #[serde(default)]
    #[validate(nested)]
    pub auth: AuthConfig,
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:8200".to_string(),
            namespace: None,
            timeout_seconds: default_timeout_seconds(),
            auth: AuthConfig::default(),
        }
    }
}

impl VaultConfig {
    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Vault authentication
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AuthConfig {
    /// Token used until (or instead of) an AppRole login
    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    /// AppRole to log in with; without it the bootstrap token is used as-is
    #[serde(default)]
    #[validate(nested)]
    pub approle: Option<AppRoleConfig>,
}

/// Bootstrap token source. `token` wins over `file`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub token: Option<SecretString>,

    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// AppRole login and credential cache
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppRoleConfig {
    /// Auth mount path
    #[serde(default = "default_approle_path")]
    #[validate(length(min = 1, message = "AppRole path cannot be empty"))]
    pub path: String,

    /// Role name
    #[validate(length(min = 1, message = "AppRole name cannot be empty"))]
    pub name: String,

    pub role_id_local_path: PathBuf,

    pub secret_id_local_path: PathBuf,
}

fn default_approle_path() -> String {
    "approle".to_string()
}

/// Reconcile loop configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ControllerConfig {
    /// Seconds between reconcile passes
    #[validate(range(min = 1, message = "Reconcile interval must be at least 1 second"))]
    pub reconcile_interval_seconds: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self { reconcile_interval_seconds: 3600 }
    }
}

impl ControllerConfig {
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_seconds)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    /// Log level or filter directive; `RUST_LOG` takes precedence
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub level: String,

    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
