use std::path::PathBuf;

use tracing::{debug, info};

use crate::{
    config::Config,
    error::{PrivmountError, Result},
    helper::HelperDriver,
    mode,
    passphrase::SecretSource,
    probe,
    transcript::HelperTranscript,
};

/// How a successful mount was achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountReport {
    /// The silent attempt succeeded against an already-cached keyring key.
    CachedKey,
    /// The keyring was unlocked and the single retry attempt succeeded.
    Unlocked {
        /// Mode flag that selected the unlock command variant.
        filename_encryption: bool,
    },
}

/// Which path a toggle invocation took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    /// The overlay was not mounted; it is now.
    Mounted(MountReport),
    /// The overlay was mounted; it no longer is.
    Unmounted,
}

/// Read-only runtime status of the overlay.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusReport {
    /// Whether the overlay is currently mounted.
    pub mounted: bool,
    /// Whether the configuration is complete enough to mount.
    pub available: bool,
    /// Plaintext mount point.
    pub mount_point: PathBuf,
    /// Mode flag, when the signature file is readable.
    pub filename_encryption: Option<bool>,
}

/// Orchestrator for one private directory overlay. Holds no state across
/// top-level invocations; every probe and mode detection is recomputed.
pub struct PrivateDirectory<'a, D, S>
where
    D: HelperDriver,
    S: SecretSource,
{
    config: &'a Config,
    driver: D,
    secret_source: S,
    transcript: HelperTranscript,
}

impl<'a, D, S> PrivateDirectory<'a, D, S>
where
    D: HelperDriver,
    S: SecretSource,
{
    /// Constructs an orchestrator. The transcript file is only created once
    /// a helper invocation gets recorded, so read-only commands such as
    /// status write nothing to disk.
    pub fn new(config: &'a Config, driver: D, secret_source: S) -> Self {
        let transcript = HelperTranscript::new(config.transcript_file());
        Self {
            config,
            driver,
            secret_source,
            transcript,
        }
    }

    /// Mounts the overlay.
    ///
    /// Attempts a silent mount first, relying on a cached keyring key. Only
    /// when that fails does it detect the mode, resolve the passphrase, run
    /// the matching unlock variant, and retry the mount exactly once. A
    /// second mount failure is terminal for this invocation.
    pub fn mount(&self) -> Result<MountReport> {
        self.config.ensure_mountable()?;

        let silent = self.driver.mount_private()?;
        self.transcript.record(&silent)?;
        if silent.success() {
            info!("mounted with cached keyring key");
            return Ok(MountReport::CachedKey);
        }
        debug!(
            exit_code = ?silent.exit_code,
            "silent mount attempt failed; unlocking the keyring"
        );

        let filename_encryption =
            mode::filename_encryption_enabled(&self.config.signature_file())?;
        let passphrase = self.secret_source.resolve()?;
        let wrapped_file = self.config.wrapped_passphrase_file();
        let unlock = if filename_encryption {
            self.driver
                .insert_wrapped_passphrase(&wrapped_file, &passphrase)?
        } else {
            self.driver
                .unwrap_and_add_passphrase(&wrapped_file, &passphrase)?
        };
        // The passphrase is consumed by exactly one unlock attempt.
        drop(passphrase);
        self.transcript.record(&unlock)?;
        if !unlock.success() {
            return Err(PrivmountError::Unlock {
                transcript: self.transcript.path().to_path_buf(),
            });
        }

        let retry = self.driver.mount_private()?;
        self.transcript.record(&retry)?;
        if retry.success() {
            info!(filename_encryption, "mounted after keyring unlock");
            return Ok(MountReport::Unlocked {
                filename_encryption,
            });
        }
        Err(PrivmountError::Mount {
            transcript: self.transcript.path().to_path_buf(),
        })
    }

    /// Unmounts the overlay. A single helper invocation, no retry.
    pub fn unmount(&self) -> Result<()> {
        let outcome = self.driver.unmount_private()?;
        self.transcript.record(&outcome)?;
        if outcome.success() {
            info!("unmounted");
            return Ok(());
        }
        Err(PrivmountError::Unmount {
            transcript: self.transcript.path().to_path_buf(),
        })
    }

    /// Returns whether the overlay is currently mounted.
    pub fn is_mounted(&self) -> Result<bool> {
        let table = self.driver.mount_table()?;
        Ok(probe::table_shows_mounted(
            &table,
            self.config.mount_point(),
        ))
    }

    /// Unmounts when mounted, mounts otherwise.
    pub fn toggle(&self) -> Result<ToggleAction> {
        if self.is_mounted()? {
            self.unmount()?;
            return Ok(ToggleAction::Unmounted);
        }
        Ok(ToggleAction::Mounted(self.mount()?))
    }

    /// Returns a read-only status report without driving any helper.
    pub fn status(&self) -> Result<StatusReport> {
        Ok(StatusReport {
            mounted: self.is_mounted()?,
            available: self.config.available(),
            mount_point: self.config.mount_point().to_path_buf(),
            filename_encryption: mode::filename_encryption_enabled(&self.config.signature_file())
                .ok(),
        })
    }
}
