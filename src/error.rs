use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level application errors.
#[derive(Debug, Error)]
pub enum PrivmountError {
    /// A required file or executable is missing; no process was spawned.
    #[error("not configured: {0}")]
    Config(String),
    /// The passphrase could not be obtained from the configured source.
    #[error("passphrase unavailable: {0}")]
    Passphrase(String),
    /// The keyring unlock pipeline exited non-zero.
    #[error("failed to unlock the keyring; helper output recorded at {}", .transcript.display())]
    Unlock {
        /// Transcript file holding the captured helper output.
        transcript: PathBuf,
    },
    /// The mount helper failed on the retry attempt after a successful unlock.
    #[error("failed to mount the private directory; helper output recorded at {}", .transcript.display())]
    Mount {
        /// Transcript file holding the captured helper output.
        transcript: PathBuf,
    },
    /// The unmount helper exited non-zero. The hint is an assumption about
    /// the most common cause, not a verified diagnosis.
    #[error("failed to unmount the private directory (it may already be unmounted); helper output recorded at {}", .transcript.display())]
    Unmount {
        /// Transcript file holding the captured helper output.
        transcript: PathBuf,
    },
    /// Input was syntactically valid but semantically unsupported.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// JSON serialization error.
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// A typed result used across the crate.
pub type Result<T> = std::result::Result<T, PrivmountError>;
