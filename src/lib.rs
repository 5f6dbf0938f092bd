#![deny(missing_docs)]
//! Privmount orchestrates mounting of a per-user eCryptfs private directory.

/// Command-line interface.
pub mod cli;
/// Resolved immutable configuration.
pub mod config;
/// Error types.
pub mod error;
/// Private-permission filesystem helpers.
pub mod fs_secure;
/// External helper driver.
pub mod helper;
/// Filename-encryption mode detection.
pub mod mode;
/// Mount, unmount, and toggle orchestration.
pub mod orchestrator;
/// Shared runtime path layout.
pub mod paths;
/// Passphrase sources.
pub mod passphrase;
/// Mount-table probing.
pub mod probe;
/// Helper invocation transcript.
pub mod transcript;
