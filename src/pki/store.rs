//! Filesystem export of certificates and keys.
//!
//! Layout for a host path `/etc/pki/web`:
//! - certificate pair: `/etc/pki/web.pem` (0644) and `/etc/pki/web-key.pem` (0600)
//! - raw key pair: `/etc/pki/web.pem` and `/etc/pki/web.pub` (both 0600)
//!
//! Existing files are overwritten in place. Parent directories are created.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{Error, Result};
use crate::utils::files::{self, PRIVATE_MODE, PUBLIC_MODE};

/// `host_path` with `suffix` appended to its final component.
pub fn with_suffix(host_path: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(host_path.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}

fn write(path: &Path, contents: &str, mode: u32) -> Result<()> {
    files::write_file(path, contents.as_bytes(), mode)
        .map_err(|e| Error::io(format!("Failed to write '{}'", path.display()), e))?;
    debug!(path = %path.display(), mode = %format!("{:o}", mode), "Wrote file");
    Ok(())
}

/// Write a certificate and its private key.
pub fn store_certificate(host_path: &Path, certificate_pem: &str, private_key_pem: &str) -> Result<()> {
    write(&with_suffix(host_path, ".pem"), certificate_pem, PUBLIC_MODE)?;
    write(&with_suffix(host_path, "-key.pem"), private_key_pem, PRIVATE_MODE)
}

/// Write a raw key pair.
pub fn store_key_pair(host_path: &Path, private_key_pem: &str, public_key_pem: &str) -> Result<()> {
    write(&with_suffix(host_path, ".pem"), private_key_pem, PRIVATE_MODE)?;
    write(&with_suffix(host_path, ".pub"), public_key_pem, PRIVATE_MODE)
}
