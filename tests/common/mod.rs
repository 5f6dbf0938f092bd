use privmount::config::{Config, ConfigOverrides};

/// A fully-populated eCryptfs layout under one scratch directory.
#[allow(dead_code)]
pub struct Fixture {
    /// Resolved configuration pointing into the scratch directory.
    pub config: Config,
    /// Scratch directory keeping the layout alive.
    pub temp_dir: tempfile::TempDir,
}

/// Builds a resolvable configuration with every required piece present:
/// private directory, both helper executables, wrapped passphrase, and a
/// signature file with the given contents.
pub fn fixture_with_signature(signature: &str) -> Fixture {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    std::fs::create_dir_all(root.join("ecryptfs")).unwrap();
    std::fs::create_dir_all(root.join("Private")).unwrap();
    std::fs::write(root.join("mount.ecryptfs_private"), b"").unwrap();
    std::fs::write(root.join("umount.ecryptfs_private"), b"").unwrap();
    std::fs::write(root.join("ecryptfs/wrapped-passphrase"), b"wrapped").unwrap();
    std::fs::write(root.join("ecryptfs/Private.sig"), signature.as_bytes()).unwrap();

    let config = Config::resolve(ConfigOverrides {
        root: Some(root.join("ecryptfs")),
        private_dir_name: Some("Private".to_owned()),
        mount_point: Some(root.join("Private")),
        passphrase_file: None,
        mount_helper: Some(root.join("mount.ecryptfs_private")),
        unmount_helper: Some(root.join("umount.ecryptfs_private")),
    })
    .unwrap();
    Fixture { config, temp_dir }
}
