mod commands;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;

const CLI_AFTER_HELP: &str = r#"Examples:
  privmount mount
  privmount toggle
  privmount status --json
  privmount --passphrase-file ~/.ecryptfs/passphrase.gpg mount
  privmount --private-dir Vault toggle

Notes:
  - Mounting tries the cached keyring key first and prompts only when
    that fails and no passphrase file is configured.
  - Helper output is recorded under the eCryptfs root directory for
    diagnosis after a failure.
"#;

/// Top-level command line parser.
#[derive(Debug, Parser)]
#[command(
    name = "privmount",
    version,
    about = "Mount and unmount a per-user eCryptfs private directory.",
    after_help = CLI_AFTER_HELP,
    infer_subcommands = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// eCryptfs root directory override.
    /// Default when unset: `~/.ecryptfs`.
    #[arg(long)]
    pub root: Option<PathBuf>,
    /// Private directory display name.
    /// Default when unset: `Private`.
    #[arg(long)]
    pub private_dir: Option<String>,
    /// Mount point override.
    /// Default when unset: the private directory under the user's home.
    #[arg(long)]
    pub mount_point: Option<PathBuf>,
    /// GPG-encrypted passphrase file. When set and present, the passphrase
    /// is decrypted from it instead of prompting.
    #[arg(long)]
    pub passphrase_file: Option<PathBuf>,
    /// Mount helper executable override.
    #[arg(long)]
    pub mount_helper: Option<PathBuf>,
    /// Unmount helper executable override.
    #[arg(long)]
    pub unmount_helper: Option<PathBuf>,
    /// Subcommand.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Mount the private directory.
    Mount,
    /// Unmount the private directory.
    Unmount,
    /// Mount when unmounted, unmount when mounted.
    Toggle,
    /// Report mount state and configuration availability.
    Status {
        /// Emit the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Runs the CLI and returns the process exit code.
pub fn run(cli: Cli) -> Result<i32> {
    commands::run(cli)
}
