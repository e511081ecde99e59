//! # Configuration Management
//!
//! keykeeper is configured from a single YAML file. The file is loaded once at
//! startup, validated, and treated as read-only afterwards.

mod resources;
mod settings;

pub use resources::{
    CaSpec, CertificateSpec, IpAddressSources, KeyPairSpec, PrivateKeySpec, Resources,
    RootCaSpec, Subject, SubjectSpec,
};
pub use settings::{
    AppConfig, AppRoleConfig, AuthConfig, BootstrapConfig, ControllerConfig, LoggingConfig,
    VaultConfig,
};

use crate::errors::{Error, Result};
use std::path::Path;

impl AppConfig {
    /// Load and validate configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("Failed to read config file '{}'", path.display()), e))?;
        Self::from_yaml_str(&contents)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(contents)
            .map_err(|e| Error::config(format!("Failed to parse YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}
