use std::{fs, path::Path};

use crate::error::Result;

/// Returns true when filenames inside the overlay are themselves encrypted.
///
/// The signature file carries one signature line per wrapped key: a single
/// line covers the content key only, while a second line adds the filename
/// encryption key. Exactly one line therefore means filename encryption is
/// off; any other count (including an empty file) means it is on. The result
/// is computed fresh on every call and never cached.
pub fn filename_encryption_enabled(signature_file: &Path) -> Result<bool> {
    let contents = fs::read_to_string(signature_file)?;
    Ok(contents.lines().count() != 1)
}
