use std::{path::PathBuf, process::Command};

use secrecy::{ExposeSecret, Secret};
use tracing::debug;
use zeroize::Zeroize;

use crate::{
    config::Config,
    error::{PrivmountError, Result},
};

const PROMPT: &str = "eCryptfs passphrase: ";

/// Unlock passphrase wrapper that avoids accidental logging and zeroizes
/// its contents on drop. A value is consumed by exactly one unlock attempt.
pub struct Passphrase {
    inner: Secret<String>,
}

impl Passphrase {
    /// Constructs a passphrase from an owned string.
    pub fn new(value: String) -> Self {
        Self {
            inner: Secret::new(value),
        }
    }

    /// Exposes the passphrase to a closure.
    pub fn expose<F, R>(&self, function: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        function(self.inner.expose_secret())
    }
}

impl std::fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Passphrase(..)")
    }
}

/// Source abstraction for obtaining the unlock passphrase. Implementations
/// may block on user input or on an external decryption process; none of
/// them retries or times out on its own.
pub trait SecretSource {
    /// Obtains the passphrase.
    fn resolve(&self) -> Result<Passphrase>;
}

/// Decrypts a GPG-encrypted passphrase file and takes the first line of the
/// plaintext. Trailing lines are discarded by convention.
pub struct GpgFileSource {
    gpg_binary: String,
    encrypted_file: PathBuf,
}

impl GpgFileSource {
    /// Constructs a source for one encrypted file.
    pub fn new(gpg_binary: impl Into<String>, encrypted_file: impl Into<PathBuf>) -> Self {
        Self {
            gpg_binary: gpg_binary.into(),
            encrypted_file: encrypted_file.into(),
        }
    }
}

impl SecretSource for GpgFileSource {
    fn resolve(&self) -> Result<Passphrase> {
        debug!(file = %self.encrypted_file.display(), "decrypting passphrase file");
        let output = Command::new(&self.gpg_binary)
            .args(["--quiet", "--batch", "--decrypt"])
            .arg(&self.encrypted_file)
            .output()
            .map_err(|error| map_spawn_error(&self.gpg_binary, error))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            return Err(PrivmountError::Passphrase(format!(
                "decryption of {} failed: {stderr}",
                self.encrypted_file.display()
            )));
        }
        first_line_of(output.stdout)
    }
}

/// Prompts for the passphrase on the controlling terminal without echo.
pub struct TtyPromptSource;

impl SecretSource for TtyPromptSource {
    fn resolve(&self) -> Result<Passphrase> {
        let value = rpassword::prompt_password(PROMPT)?;
        if value.is_empty() {
            return Err(PrivmountError::Passphrase(
                "entered passphrase is empty".to_owned(),
            ));
        }
        Ok(Passphrase::new(value))
    }
}

/// Source selected once per invocation from the configuration: a configured
/// and present passphrase file wins, otherwise the tty prompt. A decryption
/// failure propagates rather than falling back to prompting.
pub enum ConfiguredSecretSource {
    /// External decryption of the configured passphrase file.
    Gpg(GpgFileSource),
    /// Interactive non-echoing prompt.
    Prompt(TtyPromptSource),
}

impl ConfiguredSecretSource {
    /// Chooses the source for the resolved configuration.
    pub fn for_config(config: &Config) -> Self {
        match config.passphrase_file() {
            Some(file) if file.exists() => {
                Self::Gpg(GpgFileSource::new(config.gpg_binary(), file))
            }
            _ => Self::Prompt(TtyPromptSource),
        }
    }
}

impl SecretSource for ConfiguredSecretSource {
    fn resolve(&self) -> Result<Passphrase> {
        match self {
            Self::Gpg(source) => source.resolve(),
            Self::Prompt(source) => source.resolve(),
        }
    }
}

/// Extracts the first plaintext line as the passphrase and zeroizes the
/// full decrypted buffer.
fn first_line_of(mut plaintext: Vec<u8>) -> Result<Passphrase> {
    let result = match std::str::from_utf8(&plaintext) {
        Ok(text) => match text.lines().next().unwrap_or_default() {
            "" => Err(PrivmountError::Passphrase(
                "decrypted passphrase is empty".to_owned(),
            )),
            first_line => Ok(Passphrase::new(first_line.to_owned())),
        },
        Err(_) => Err(PrivmountError::Passphrase(
            "decrypted passphrase is not valid UTF-8".to_owned(),
        )),
    };
    plaintext.zeroize();
    result
}

fn map_spawn_error(binary: &str, error: std::io::Error) -> PrivmountError {
    if error.kind() == std::io::ErrorKind::NotFound {
        return PrivmountError::Config(format!("required binary not found: {binary}"));
    }
    PrivmountError::Io(error)
}

#[cfg(test)]
mod unit_tests {
    use super::{first_line_of, Passphrase, SecretSource};
    use crate::error::PrivmountError;

    #[test]
    fn first_line_discards_trailing_lines() {
        let passphrase = first_line_of(b"secretpass\nleftover\n".to_vec()).unwrap();
        passphrase.expose(|value| assert_eq!(value, "secretpass"));
    }

    #[test]
    fn first_line_without_trailing_newline() {
        let passphrase = first_line_of(b"secretpass".to_vec()).unwrap();
        passphrase.expose(|value| assert_eq!(value, "secretpass"));
    }

    #[test]
    fn empty_plaintext_is_an_error() {
        assert!(matches!(
            first_line_of(Vec::new()),
            Err(PrivmountError::Passphrase(_))
        ));
    }

    #[test]
    fn debug_output_does_not_leak_the_value() {
        let passphrase = Passphrase::new("secretpass".to_owned());
        assert_eq!(format!("{passphrase:?}"), "Passphrase(..)");
    }

    #[test]
    fn stub_sources_resolve_through_the_trait() {
        struct Fixed;
        impl SecretSource for Fixed {
            fn resolve(&self) -> crate::error::Result<Passphrase> {
                Ok(Passphrase::new("stub".to_owned()))
            }
        }
        Fixed.resolve().unwrap().expose(|value| {
            assert_eq!(value, "stub");
        });
    }
}
