use std::path::{Path, PathBuf};

use crate::{
    error::{PrivmountError, Result},
    paths::EcryptfsPaths,
};

/// Display name of the private directory under the user's home.
pub const DEFAULT_PRIVATE_DIR_NAME: &str = "Private";
/// Default mount helper shipped by ecryptfs-utils.
pub const DEFAULT_MOUNT_HELPER: &str = "/sbin/mount.ecryptfs_private";
/// Default unmount helper shipped by ecryptfs-utils.
pub const DEFAULT_UNMOUNT_HELPER: &str = "/sbin/umount.ecryptfs_private";
/// Binary used to decrypt an encrypted passphrase file.
pub const DEFAULT_GPG_BINARY: &str = "gpg";
/// Binary producing the live mount table as text.
pub const DEFAULT_MOUNT_TABLE_BINARY: &str = "mount";
/// eCryptfs configuration directory name under the user's home.
pub const ECRYPTFS_ROOT_DIR_NAME: &str = ".ecryptfs";
/// Filesystem type marker scanned for in mount-table lines.
pub const FILESYSTEM_TYPE_MARKER: &str = "ecryptfs";

/// Per-invocation overrides collected from the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// eCryptfs root directory override.
    pub root: Option<PathBuf>,
    /// Private directory display name override.
    pub private_dir_name: Option<String>,
    /// Mount point override.
    pub mount_point: Option<PathBuf>,
    /// GPG-encrypted passphrase file.
    pub passphrase_file: Option<PathBuf>,
    /// Mount helper executable override.
    pub mount_helper: Option<PathBuf>,
    /// Unmount helper executable override.
    pub unmount_helper: Option<PathBuf>,
}

/// Immutable set of paths and command locations, resolved once per
/// invocation and passed by reference to every component.
#[derive(Debug, Clone)]
pub struct Config {
    private_dir_name: String,
    mount_point: PathBuf,
    paths: EcryptfsPaths,
    mount_helper: PathBuf,
    unmount_helper: PathBuf,
    gpg_binary: String,
    mount_table_binary: String,
    passphrase_file: Option<PathBuf>,
}

impl Config {
    /// Resolves the configuration from defaults and overrides.
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            PrivmountError::Config("home directory could not be determined".to_owned())
        })?;

        let private_dir_name = overrides
            .private_dir_name
            .unwrap_or_else(|| DEFAULT_PRIVATE_DIR_NAME.to_owned());
        validate_private_dir_name(&private_dir_name)?;

        let root = overrides
            .root
            .unwrap_or_else(|| home.join(ECRYPTFS_ROOT_DIR_NAME));
        let mount_point = overrides
            .mount_point
            .unwrap_or_else(|| home.join(&private_dir_name));
        let mount_helper = overrides
            .mount_helper
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MOUNT_HELPER));
        let unmount_helper = overrides
            .unmount_helper
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UNMOUNT_HELPER));

        ensure_absolute(&root, "root directory")?;
        ensure_absolute(&mount_point, "mount point")?;
        ensure_absolute(&mount_helper, "mount helper")?;
        ensure_absolute(&unmount_helper, "unmount helper")?;
        if let Some(passphrase_file) = &overrides.passphrase_file {
            ensure_absolute(passphrase_file, "passphrase file")?;
        }

        Ok(Self {
            private_dir_name,
            mount_point,
            paths: EcryptfsPaths::new(root),
            mount_helper,
            unmount_helper,
            gpg_binary: DEFAULT_GPG_BINARY.to_owned(),
            mount_table_binary: DEFAULT_MOUNT_TABLE_BINARY.to_owned(),
            passphrase_file: overrides.passphrase_file,
        })
    }

    /// Private directory display name.
    pub fn private_dir_name(&self) -> &str {
        &self.private_dir_name
    }

    /// Plaintext mount point under the user's home.
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Path layout under the eCryptfs root directory.
    pub fn paths(&self) -> &EcryptfsPaths {
        &self.paths
    }

    /// Wrapped passphrase file.
    pub fn wrapped_passphrase_file(&self) -> PathBuf {
        self.paths.wrapped_passphrase_file()
    }

    /// Signature file for the private directory.
    pub fn signature_file(&self) -> PathBuf {
        self.paths.signature_file(&self.private_dir_name)
    }

    /// Helper transcript file.
    pub fn transcript_file(&self) -> PathBuf {
        self.paths.transcript_file()
    }

    /// Mount helper executable.
    pub fn mount_helper(&self) -> &Path {
        &self.mount_helper
    }

    /// Unmount helper executable.
    pub fn unmount_helper(&self) -> &Path {
        &self.unmount_helper
    }

    /// Decryption binary for the encrypted passphrase file.
    pub fn gpg_binary(&self) -> &str {
        &self.gpg_binary
    }

    /// Binary producing the mount table.
    pub fn mount_table_binary(&self) -> &str {
        &self.mount_table_binary
    }

    /// Optional GPG-encrypted passphrase file.
    pub fn passphrase_file(&self) -> Option<&Path> {
        self.passphrase_file.as_deref()
    }

    /// True only when the private directory, both helpers, the wrapped
    /// passphrase file, and the signature file all exist.
    pub fn available(&self) -> bool {
        self.ensure_mountable().is_ok()
    }

    /// Fails fast with a configuration error naming the first missing piece.
    /// Must be called before any mount-side process is spawned.
    pub fn ensure_mountable(&self) -> Result<()> {
        if !self.mount_point.is_dir() {
            return Err(missing("private directory", &self.mount_point));
        }
        if !self.mount_helper.exists() {
            return Err(missing("mount helper", &self.mount_helper));
        }
        if !self.unmount_helper.exists() {
            return Err(missing("unmount helper", &self.unmount_helper));
        }
        let wrapped = self.wrapped_passphrase_file();
        if !wrapped.exists() {
            return Err(missing("wrapped passphrase file", &wrapped));
        }
        let signature = self.signature_file();
        if !signature.exists() {
            return Err(missing("signature file", &signature));
        }
        Ok(())
    }
}

fn missing(what: &str, path: &Path) -> PrivmountError {
    PrivmountError::Config(format!("{what} is missing: {}", path.display()))
}

fn ensure_absolute(path: &Path, what: &str) -> Result<()> {
    if path.is_absolute() {
        return Ok(());
    }
    Err(PrivmountError::InvalidInput(format!(
        "{what} must be an absolute path: {}",
        path.display()
    )))
}

fn validate_private_dir_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PrivmountError::InvalidInput(
            "private directory name cannot be empty".to_owned(),
        ));
    }
    if name.contains('/') || name == "." || name == ".." {
        return Err(PrivmountError::InvalidInput(
            "private directory name must be a single path component".to_owned(),
        ));
    }
    Ok(())
}
