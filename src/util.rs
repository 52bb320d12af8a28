//! Utility functions shared across setback modules.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{Result, SetbackError};

/// Maximum file size that can be read into memory (10 MB).
///
/// Vault notes, the event log, and the task list are expected to stay well
/// under this limit.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Read a file into a string, refusing files larger than `MAX_FILE_SIZE`.
pub fn read_to_string_limited(path: &Path) -> Result<String> {
    read_to_string_with_limit(path, MAX_FILE_SIZE)
}

/// Read a file into a string with a custom size limit.
///
/// # Errors
///
/// Returns an error if the file cannot be read or exceeds `max_size`.
pub fn read_to_string_with_limit(path: &Path, max_size: u64) -> Result<String> {
    let metadata = fs::metadata(path).map_err(|e| SetbackError::storage(path, e))?;

    let size = metadata.len();
    if size > max_size {
        return Err(SetbackError::document(format!(
            "File {} is too large ({} bytes, max {} bytes)",
            path.display(),
            size,
            max_size
        )));
    }

    fs::read_to_string(path).map_err(|e| SetbackError::storage(path, e))
}

/// Write `content` to `path` atomically via a sibling temp file and rename.
///
/// Parent directories are created as needed.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| SetbackError::storage(parent, e))?;
        }
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name));

    {
        let mut file =
            fs::File::create(&temp_path).map_err(|e| SetbackError::storage(&temp_path, e))?;
        file.write_all(content)
            .map_err(|e| SetbackError::storage(&temp_path, e))?;
        file.sync_all()
            .map_err(|e| SetbackError::storage(&temp_path, e))?;
    }

    fs::rename(&temp_path, path).map_err(|e| SetbackError::storage(path, e))
}
