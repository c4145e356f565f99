//! Byte-for-byte file backups.
//!
//! A backup is a sibling file holding the pre-edit content of a patched file.
//! At most one backup exists per path; it is created before a patch and
//! consumed (restored and deleted) on reset. Works for any file, not only
//! scripts, so staged data descriptors use the same mechanism.

use crate::error::{EditError, EditResult};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix appended to the original file name to form the backup path.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Sibling backup path for `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Whether a backup currently exists for `path`.
pub fn has_backup(path: &Path) -> bool {
    backup_path(path).exists()
}

/// Write the current content of `path` to its backup file, overwriting any
/// previous backup.
pub fn back_up_file(path: &Path) -> EditResult<()> {
    let bytes = read_existing(path)?;
    fs::write(backup_path(path), bytes)?;
    Ok(())
}

/// Restore `path` from its backup and delete the backup file.
///
/// Fails without touching the filesystem when no backup exists.
pub fn restore_file(path: &Path) -> EditResult<()> {
    let backup = backup_path(path);
    if !backup.exists() {
        return Err(EditError::NoBackup(path.to_path_buf()));
    }
    let bytes = fs::read(&backup)?;
    fs::write(path, bytes)?;
    fs::remove_file(&backup)?;
    Ok(())
}

pub(crate) fn read_existing(path: &Path) -> EditResult<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(EditError::NotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}
