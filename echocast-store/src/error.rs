//! Store error types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the disk-backed stores.
///
/// `QueueWrite` means the submission was not durably recorded and the
/// producer must retry. Everything else is a store-level failure; per the
/// error-handling policy these are the only errors allowed to terminate the
/// worker abnormally.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("queue write failed at {path}: {source}")]
    QueueWrite { path: PathBuf, source: io::Error },

    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("malformed data at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("job record not found: {0}")]
    RecordNotFound(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StoreError::Corrupt {
            path: path.into(),
            source,
        }
    }
}
