use std::path::{Path, PathBuf};

/// Canonical path layout for per-user eCryptfs runtime files.
#[derive(Debug, Clone)]
pub struct EcryptfsPaths {
    root: PathBuf,
}

impl EcryptfsPaths {
    /// Creates a path layout rooted at `root` (conventionally `~/.ecryptfs`).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root configuration directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Passphrase as stored on disk, encrypted under a derived key.
    pub fn wrapped_passphrase_file(&self) -> PathBuf {
        self.root.join("wrapped-passphrase")
    }

    /// Signature file for the named private directory.
    pub fn signature_file(&self, private_dir_name: &str) -> PathBuf {
        self.root.join(format!("{private_dir_name}.sig"))
    }

    /// JSONL transcript of helper invocations.
    pub fn transcript_file(&self) -> PathBuf {
        self.root.join("helper-transcript.jsonl")
    }
}

#[cfg(test)]
mod unit_tests {
    use super::EcryptfsPaths;

    #[test]
    fn derived_paths_live_under_root() {
        let paths = EcryptfsPaths::new("/home/u/.ecryptfs");
        assert_eq!(
            paths.wrapped_passphrase_file(),
            std::path::PathBuf::from("/home/u/.ecryptfs/wrapped-passphrase")
        );
        assert_eq!(
            paths.signature_file("Private"),
            std::path::PathBuf::from("/home/u/.ecryptfs/Private.sig")
        );
        assert_eq!(
            paths.transcript_file(),
            std::path::PathBuf::from("/home/u/.ecryptfs/helper-transcript.jsonl")
        );
    }
}
