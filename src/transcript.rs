use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};

use crate::{
    error::Result,
    fs_secure::{create_private_file_if_missing, ensure_private_dir, set_permissions, PRIVATE_FILE_MODE},
    helper::HelperOutcome,
};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct TranscriptLine {
    timestamp: DateTime<Utc>,
    helper: String,
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
}

/// JSONL append-only record of helper invocations. Fatal errors reference
/// this file so the captured process output can be inspected.
pub struct HelperTranscript {
    path: PathBuf,
}

impl HelperTranscript {
    /// Binds a transcript to `path`. Nothing is touched on disk until the
    /// first recorded outcome, so read-only commands leave no file behind.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Appends one helper outcome as a JSON line, creating the transcript
    /// file with private permissions if it does not exist yet.
    pub fn record(&self, outcome: &HelperOutcome) -> Result<()> {
        let line = TranscriptLine {
            timestamp: Utc::now(),
            helper: outcome.helper.clone(),
            exit_code: outcome.exit_code,
            stdout: outcome.stdout.clone(),
            stderr: outcome.stderr.clone(),
        };

        if let Some(parent) = self.path.parent() {
            ensure_private_dir(parent)?;
        }
        create_private_file_if_missing(&self.path, b"")?;
        set_permissions(&self.path, PRIVATE_FILE_MODE)?;
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        serde_json::to_writer(&mut file, &line)?;
        file.write_all(b"\n")?;
        Ok(())
    }

    /// Returns the transcript file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
