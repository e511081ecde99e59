//! Small filesystem helpers shared by the certificate store and the AppRole
//! credential cache.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Mode for certificates and public keys readable by workloads.
pub const PUBLIC_MODE: u32 = 0o644;

/// Mode for private keys and credentials.
pub const PRIVATE_MODE: u32 = 0o600;

/// Write `contents` to `path` with `mode`, creating parent directories.
///
/// The data goes to a temporary file in the same directory whose mode is set
/// before anything is written, which is then renamed over `path`. Readers see
/// either the old file or the complete new one, and a secret is never readable
/// under the old file's permissions.
pub fn write_file(path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(parent)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file().set_permissions(fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Contents of `path` without surrounding whitespace, or `None` when the file
/// is missing, unreadable or blank.
pub async fn read_trimmed(path: &Path) -> Option<String> {
    let contents = tokio::fs::read_to_string(path).await.ok()?;
    let trimmed = contents.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
