use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    process::{Child, Command, Output, Stdio},
    thread,
    time::Duration,
};

use tracing::debug;
use zeroize::Zeroize;

use crate::{
    config::Config,
    error::{PrivmountError, Result},
    passphrase::Passphrase,
};

/// Inserts the wrapped passphrase into the keyring in one step.
pub const INSERT_WRAPPED_BINARY: &str = "ecryptfs-insert-wrapped-passphrase-into-keyring";
/// Unwraps the on-disk passphrase to plaintext.
pub const UNWRAP_BINARY: &str = "ecryptfs-unwrap-passphrase";
/// Adds a plaintext passphrase to the keyring.
pub const ADD_PASSPHRASE_BINARY: &str = "ecryptfs-add-passphrase";

// The ecryptfs-utils tools read the passphrase from stdin when this is
// passed in place of the passphrase operand.
const STDIN_PASSPHRASE_ARG: &str = "-";

const EXEC_BUSY_RETRY_ATTEMPTS: usize = 20;
const EXEC_BUSY_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Captured result of one helper invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperOutcome {
    /// Helper label for the transcript.
    pub helper: String,
    /// Process exit code; `None` when the process died to a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl HelperOutcome {
    /// True when the helper exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    fn from_output(helper: impl Into<String>, output: &Output) -> Self {
        Self {
            helper: helper.into(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        }
    }
}

/// External helper orchestration abstraction. One method call maps to one
/// blocking helper invocation (the two-stage unlock counts as one pipeline).
pub trait HelperDriver {
    /// Runs the mount helper with no passphrase, relying on a cached key.
    fn mount_private(&self) -> Result<HelperOutcome>;
    /// Runs the unmount helper.
    fn unmount_private(&self) -> Result<HelperOutcome>;
    /// Inserts the wrapped passphrase directly into the keyring
    /// (filename encryption on).
    fn insert_wrapped_passphrase(
        &self,
        wrapped_file: &Path,
        passphrase: &Passphrase,
    ) -> Result<HelperOutcome>;
    /// Unwraps the passphrase and adds it to the keyring in two stages
    /// (filename encryption off).
    fn unwrap_and_add_passphrase(
        &self,
        wrapped_file: &Path,
        passphrase: &Passphrase,
    ) -> Result<HelperOutcome>;
    /// Returns the live mount table as text.
    fn mount_table(&self) -> Result<String>;
}

/// System driver invoking the ecryptfs-utils binaries. The passphrase is
/// always handed to the helpers over stdin, never through argv, so it does
/// not show up in process listings.
#[derive(Debug, Clone)]
pub struct SystemHelperDriver {
    mount_helper: PathBuf,
    unmount_helper: PathBuf,
    insert_binary: String,
    unwrap_binary: String,
    add_binary: String,
    mount_table_binary: String,
}

impl SystemHelperDriver {
    /// Constructs a driver for the resolved configuration.
    pub fn for_config(config: &Config) -> Self {
        Self {
            mount_helper: config.mount_helper().to_path_buf(),
            unmount_helper: config.unmount_helper().to_path_buf(),
            insert_binary: INSERT_WRAPPED_BINARY.to_owned(),
            unwrap_binary: UNWRAP_BINARY.to_owned(),
            add_binary: ADD_PASSPHRASE_BINARY.to_owned(),
            mount_table_binary: config.mount_table_binary().to_owned(),
        }
    }

    fn run_captured(&self, binary: &Path) -> Result<HelperOutcome> {
        let label = binary.display().to_string();
        debug!(helper = %label, "running helper");
        let output = retry_exec_busy(|| Command::new(binary).output())
            .map_err(|error| map_command_execution_error(&label, error))?;
        Ok(HelperOutcome::from_output(label, &output))
    }

    fn spawn_with_piped_stdin(&self, binary: &str, args: &[&std::ffi::OsStr]) -> Result<Child> {
        debug!(helper = binary, "running helper");
        retry_exec_busy(|| {
            Command::new(binary)
                .args(args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
        })
        .map_err(|error| map_command_execution_error(binary, error))
    }
}

impl HelperDriver for SystemHelperDriver {
    fn mount_private(&self) -> Result<HelperOutcome> {
        self.run_captured(&self.mount_helper)
    }

    fn unmount_private(&self) -> Result<HelperOutcome> {
        self.run_captured(&self.unmount_helper)
    }

    fn insert_wrapped_passphrase(
        &self,
        wrapped_file: &Path,
        passphrase: &Passphrase,
    ) -> Result<HelperOutcome> {
        let mut child = self.spawn_with_piped_stdin(
            &self.insert_binary,
            &[wrapped_file.as_os_str(), STDIN_PASSPHRASE_ARG.as_ref()],
        )?;
        write_secret_line(&mut child, passphrase)?;
        let output = child.wait_with_output()?;
        Ok(HelperOutcome::from_output(&self.insert_binary, &output))
    }

    fn unwrap_and_add_passphrase(
        &self,
        wrapped_file: &Path,
        passphrase: &Passphrase,
    ) -> Result<HelperOutcome> {
        let pipeline_label = format!("{} | {}", self.unwrap_binary, self.add_binary);

        let mut unwrap_child = self.spawn_with_piped_stdin(
            &self.unwrap_binary,
            &[wrapped_file.as_os_str(), STDIN_PASSPHRASE_ARG.as_ref()],
        )?;
        write_secret_line(&mut unwrap_child, passphrase)?;
        let unwrap_output = unwrap_child.wait_with_output()?;
        // The unwrap stage prints the unwrapped passphrase; it must never
        // reach the transcript.
        let mut unwrapped = unwrap_output.stdout;
        if !unwrap_output.status.success() {
            unwrapped.zeroize();
            return Ok(HelperOutcome {
                helper: pipeline_label,
                exit_code: unwrap_output.status.code(),
                stdout: String::new(),
                stderr: String::from_utf8_lossy(&unwrap_output.stderr)
                    .trim()
                    .to_owned(),
            });
        }

        let mut add_child =
            self.spawn_with_piped_stdin(&self.add_binary, &[STDIN_PASSPHRASE_ARG.as_ref()])?;
        let write_result = write_bytes_to_stdin(&mut add_child, &unwrapped);
        unwrapped.zeroize();
        if let Err(error) = write_result {
            let _ = add_child.kill();
            let _ = add_child.wait();
            return Err(error);
        }
        let add_output = add_child.wait_with_output()?;

        let mut stderr = String::from_utf8_lossy(&unwrap_output.stderr).trim().to_owned();
        let add_stderr = String::from_utf8_lossy(&add_output.stderr).trim().to_owned();
        if !add_stderr.is_empty() {
            if !stderr.is_empty() {
                stderr.push('\n');
            }
            stderr.push_str(&add_stderr);
        }
        Ok(HelperOutcome {
            helper: pipeline_label,
            exit_code: add_output.status.code(),
            stdout: String::from_utf8_lossy(&add_output.stdout).trim().to_owned(),
            stderr,
        })
    }

    fn mount_table(&self) -> Result<String> {
        let output = retry_exec_busy(|| Command::new(&self.mount_table_binary).output())
            .map_err(|error| map_command_execution_error(&self.mount_table_binary, error))?;
        if !output.status.success() {
            return Err(PrivmountError::Io(io::Error::other(format!(
                "{} exited non-zero while reading the mount table",
                self.mount_table_binary
            ))));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn write_secret_line(child: &mut Child, passphrase: &Passphrase) -> Result<()> {
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| PrivmountError::Io(io::Error::other("helper stdin was not piped")))?;
    let result = passphrase.expose(|value| {
        stdin
            .write_all(value.as_bytes())
            .and_then(|()| stdin.write_all(b"\n"))
    });
    tolerate_closed_stdin(result)
}

fn write_bytes_to_stdin(child: &mut Child, bytes: &[u8]) -> Result<()> {
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| PrivmountError::Io(io::Error::other("helper stdin was not piped")))?;
    tolerate_closed_stdin(stdin.write_all(bytes))
}

// A helper that exits before reading its stdin closes the pipe. That is a
// helper failure, not an I/O failure of ours: the caller still collects the
// exit status and stderr through `wait_with_output`.
fn tolerate_closed_stdin(result: io::Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(error) => Err(PrivmountError::Io(error)),
    }
}

fn map_command_execution_error(binary: &str, error: io::Error) -> PrivmountError {
    if error.kind() == io::ErrorKind::NotFound {
        return PrivmountError::Config(format!("required binary not found: {binary}"));
    }
    PrivmountError::Io(error)
}

fn retry_exec_busy<T, F>(mut operation: F) -> io::Result<T>
where
    F: FnMut() -> io::Result<T>,
{
    let mut last_error = None;
    for attempt in 0..EXEC_BUSY_RETRY_ATTEMPTS {
        match operation() {
            Ok(value) => return Ok(value),
            Err(error) if is_exec_busy_error(&error) && attempt + 1 < EXEC_BUSY_RETRY_ATTEMPTS => {
                last_error = Some(error);
                thread::sleep(EXEC_BUSY_RETRY_DELAY);
            }
            Err(error) => return Err(error),
        }
    }

    Err(last_error.unwrap_or_else(|| io::Error::other("command execution failed")))
}

fn is_exec_busy_error(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::ExecutableFileBusy || error.raw_os_error() == Some(26)
}
