use std::{fs, path::Path};

use crate::error::Result;

/// Default Unix mode for private directories.
pub const PRIVATE_DIR_MODE: u32 = 0o700;
/// Default Unix mode for private files.
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// Ensures a directory exists and applies restricted permissions.
pub fn ensure_private_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    set_permissions(path, PRIVATE_DIR_MODE)
}

/// Writes a private file only if it does not exist.
pub fn create_private_file_if_missing(path: &Path, bytes: &[u8]) -> Result<()> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        set_permissions(path, PRIVATE_FILE_MODE)?;
    }
    Ok(())
}

/// Applies Unix permissions when supported.
pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
    Ok(())
}
