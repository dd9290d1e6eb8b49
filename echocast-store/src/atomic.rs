//! Atomic file writes
//!
//! Writers in different processes may target the same path (the worker
//! updating a record while the server flips its cancel flag), so every
//! write goes to a uniquely named temp file in the same directory and is
//! renamed into place. Readers see either the old document or the new one,
//! never a partial write.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreError;

/// Writes `bytes` to `path` atomically. Cleans up the temp file on failure
/// so no partial artifact is left dangling.
pub(crate) fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(
        ".{file_name}.{}.tmp",
        Uuid::new_v4().simple()
    ));

    let result = fs::File::create(&tmp)
        .and_then(|mut f| f.write_all(bytes))
        .and_then(|_| fs::rename(&tmp, path));

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(StoreError::io(path, e));
    }
    Ok(())
}

/// Serializes `value` as pretty JSON and writes it atomically to `path`.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::corrupt(path, e))?;
    write_bytes(path, &bytes)
}
