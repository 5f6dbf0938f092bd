use std::path::Path;

use crate::config::FILESYSTEM_TYPE_MARKER;

/// Returns true when any mount-table line references both the mount point
/// and the eCryptfs filesystem type marker.
///
/// This is a textual scan over the table output, not a structured parse:
/// arbitrary text before, between, and after the two substrings is accepted,
/// but both must appear on the same line.
pub fn table_shows_mounted(mount_table: &str, mount_point: &Path) -> bool {
    let needle = mount_point.to_string_lossy();
    mount_table
        .lines()
        .any(|line| line.contains(needle.as_ref()) && line.contains(FILESYSTEM_TYPE_MARKER))
}
